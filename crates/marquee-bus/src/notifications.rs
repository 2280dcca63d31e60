//! Toast lifecycle driven by `notification` events.
//!
//! Every record goes `Created -> Removed`, either when the user dismisses
//! it or when its timer fires, whichever comes first. Removal goes through
//! one path ([`Board::remove`]), which is a no-op for an id that is no
//! longer live, so the loser of the race does nothing. Each record keeps
//! the abort handle of its timer; user dismissal and [`NotificationCenter::detach`]
//! abort it.

use crate::bus::{EventBus, Subscription};
use crate::event::{Event, Notice, Severity, Topic};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ToastId(u64);

impl fmt::Display for ToastId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "toast-{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub id: ToastId,
    pub message: String,
    pub severity: Severity,
    /// Unix timestamp (ms).
    pub created_at_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dismissal {
    User,
    Timeout,
    Teardown,
}

struct LiveToast {
    toast: Toast,
    timer: Option<AbortHandle>,
}

#[derive(Default)]
struct Board {
    next_id: u64,
    live: Vec<LiveToast>,
    detached: bool,
}

impl Board {
    fn remove(&mut self, id: ToastId, reason: Dismissal) -> bool {
        let Some(position) = self.live.iter().position(|t| t.toast.id == id) else {
            tracing::trace!(toast_id = %id, reason = ?reason, "toast already removed");
            return false;
        };
        let removed = self.live.remove(position);
        if reason != Dismissal::Timeout {
            if let Some(timer) = removed.timer {
                timer.abort();
            }
        }
        tracing::debug!(toast_id = %id, reason = ?reason, "toast removed");
        true
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}

/// Live toast collection plus its subscription to `notification`.
///
/// Clones share the same collection.
#[derive(Clone)]
pub struct NotificationCenter {
    board: Arc<Mutex<Board>>,
    subscription: Subscription,
}

impl NotificationCenter {
    /// Subscribes to `notification` on `bus`; timers run on the current
    /// tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn attach(bus: &EventBus, dismiss_after: Duration) -> Self {
        Self::attach_with_handle(bus, dismiss_after, Handle::current())
    }

    pub fn attach_with_handle(bus: &EventBus, dismiss_after: Duration, runtime: Handle) -> Self {
        let board = Arc::new(Mutex::new(Board::default()));
        let weak = Arc::downgrade(&board);
        let subscription = bus.subscribe(Topic::Notification, move |event| {
            if let Event::Notification(notice) = event {
                if let Some(board) = weak.upgrade() {
                    arm(&board, notice, dismiss_after, &runtime);
                }
            }
        });
        let dismiss_after_ms = u64::try_from(dismiss_after.as_millis()).unwrap_or(u64::MAX);
        tracing::debug!(dismiss_after_ms, "notification center attached");
        Self {
            board,
            subscription,
        }
    }

    /// Arrival-ordered copy of the live toasts.
    pub fn toasts(&self) -> Vec<Toast> {
        lock(&self.board).live.iter().map(|t| t.toast.clone()).collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.board).live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// User dismissal. Returns `false` if the toast is already gone.
    pub fn dismiss(&self, id: ToastId) -> bool {
        lock(&self.board).remove(id, Dismissal::User)
    }

    /// Stops listening, cancels every pending timer and empties the
    /// collection. Safe to call repeatedly.
    pub fn detach(&self) {
        self.subscription.unsubscribe();
        let mut board = lock(&self.board);
        if board.detached {
            return;
        }
        board.detached = true;
        let ids: Vec<ToastId> = board.live.iter().map(|t| t.toast.id).collect();
        for id in ids {
            board.remove(id, Dismissal::Teardown);
        }
        tracing::debug!("notification center detached");
    }
}

fn lock(board: &Mutex<Board>) -> MutexGuard<'_, Board> {
    board.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn arm(board: &Arc<Mutex<Board>>, notice: &Notice, dismiss_after: Duration, runtime: &Handle) {
    let mut guard = lock(board);
    if guard.detached {
        return;
    }
    guard.next_id += 1;
    let id = ToastId(guard.next_id);
    let deadline = Instant::now() + dismiss_after;

    let weak: Weak<Mutex<Board>> = Arc::downgrade(board);
    let timer = runtime.spawn(async move {
        tokio::time::sleep_until(deadline).await;
        if let Some(board) = weak.upgrade() {
            lock(&board).remove(id, Dismissal::Timeout);
        }
    });

    guard.live.push(LiveToast {
        toast: Toast {
            id,
            message: notice.message.clone(),
            severity: notice.severity,
            created_at_ms: now_ms(),
        },
        timer: Some(timer.abort_handle()),
    });
    tracing::debug!(toast_id = %id, severity = ?notice.severity, "toast created");
}
