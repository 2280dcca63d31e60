//! Synchronous, in-process publish/subscribe hub.
//!
//! Listeners run on the publishing thread, in registration order, before
//! [`EventBus::publish`] returns. Dispatch works on a snapshot of the
//! registry taken when the publish starts, and the registry lock is not
//! held while listeners run, so listeners may subscribe, unsubscribe or
//! publish again. Nothing is buffered: publishing to a topic without
//! listeners drops the event.

use crate::event::{Event, Topic};
use std::any::Any;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

type Listener = Arc<dyn Fn(&Event) + Send + Sync>;

#[derive(Clone)]
struct Entry {
    id: u64,
    active: Arc<AtomicBool>,
    listener: Listener,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    topics: HashMap<Topic, Vec<Entry>>,
}

impl Registry {
    fn add(&mut self, topic: Topic, listener: Listener) -> (u64, Arc<AtomicBool>) {
        self.next_id += 1;
        let id = self.next_id;
        let active = Arc::new(AtomicBool::new(true));
        self.topics.entry(topic).or_default().push(Entry {
            id,
            active: active.clone(),
            listener,
        });
        (id, active)
    }

    fn remove(&mut self, topic: Topic, id: u64) {
        if let Some(entries) = self.topics.get_mut(&topic) {
            // `remove` rather than `swap_remove`: dispatch order is registration order.
            if let Some(position) = entries.iter().position(|e| e.id == id) {
                entries.remove(position);
            }
            if entries.is_empty() {
                self.topics.remove(&topic);
            }
        }
    }

    fn snapshot(&self, topic: Topic) -> Vec<Entry> {
        self.topics.get(&topic).cloned().unwrap_or_default()
    }
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    match registry.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("bus registry mutex poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

/// Cheap to clone; every clone talks to the same registry.
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<Mutex<Registry>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener` for every later publish on `topic`.
    ///
    /// Registering the same closure twice yields two independent
    /// subscriptions.
    pub fn subscribe<F>(&self, topic: Topic, listener: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let (id, active) = lock(&self.registry).add(topic, Arc::new(listener));
        tracing::debug!(topic = %topic, subscription = id, "listener subscribed");
        Subscription {
            id,
            topic,
            active,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Delivers `event` to the listeners of its topic and returns how many
    /// ran.
    ///
    /// A panicking listener is logged and skipped; the remaining listeners
    /// still run. Listeners added during this call are not invoked by it,
    /// and listeners removed during it are skipped if not yet reached.
    pub fn publish(&self, event: Event) -> usize {
        let topic = event.topic();
        let snapshot = lock(&self.registry).snapshot(topic);
        if snapshot.is_empty() {
            tracing::trace!(topic = %topic, "no listeners, event dropped");
            return 0;
        }

        let mut delivered = 0;
        for entry in snapshot {
            if !entry.active.load(Ordering::Acquire) {
                continue;
            }
            let listener = entry.listener.as_ref();
            match catch_unwind(AssertUnwindSafe(|| listener(&event))) {
                Ok(()) => delivered += 1,
                Err(panic) => tracing::error!(
                    topic = %topic,
                    subscription = entry.id,
                    panic = %panic_message(panic.as_ref()),
                    "listener panicked, continuing dispatch"
                ),
            }
        }
        tracing::trace!(topic = %topic, delivered = delivered, "event dispatched");
        delivered
    }

    pub fn listener_count(&self, topic: Topic) -> usize {
        lock(&self.registry)
            .topics
            .get(&topic)
            .map_or(0, Vec::len)
    }

    /// Whether both handles share one registry.
    pub fn same_bus(&self, other: &EventBus) -> bool {
        Arc::ptr_eq(&self.registry, &other.registry)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Handle for one registration. Dropping it keeps the listener registered;
/// call [`Subscription::unsubscribe`] to remove it.
#[derive(Clone)]
pub struct Subscription {
    id: u64,
    topic: Topic,
    active: Arc<AtomicBool>,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Removes exactly this registration. Later calls do nothing.
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).remove(self.topic, self.id);
            tracing::debug!(topic = %self.topic, subscription = self.id, "listener unsubscribed");
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .field("active", &self.is_active())
            .finish()
    }
}
