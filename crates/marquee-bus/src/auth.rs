//! Login/logout actions: persist first, then fan out on the bus.
//!
//! Listeners of `userLoggedIn` / `userLoggedOut` always observe the session
//! and roster stores in their final state for that action. When the second
//! store write fails the first one is undone and nothing is published.

use crate::bus::EventBus;
use crate::event::{Event, Notice};
use marquee_core::error::log_error;
use marquee_core::{CoreResult, Role, RosterStore, SessionStore, UserRecord};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info_span, Span};

pub const EMPTY_USER_ID_MESSAGE: &str = "Please enter a User ID";
pub const LOGGED_OUT_MESSAGE: &str = "Logged out successfully";

static ACTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

fn action_span(action: &'static str) -> Span {
    let action_id = ACTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    info_span!("action", action = action, action_id = action_id)
}

pub fn welcome_message(user_id: &str) -> String {
    format!("Welcome {user_id}!")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Blank id; a warning notification was published and nothing stored.
    Rejected,
    LoggedIn(UserRecord),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogoutOutcome {
    LoggedOut(UserRecord),
    /// No session was stored. The events are published anyway.
    NoSession,
}

#[derive(Clone)]
pub struct AuthService {
    bus: EventBus,
    session: SessionStore,
    roster: RosterStore,
}

impl AuthService {
    pub fn new(bus: EventBus, session: SessionStore, roster: RosterStore) -> Self {
        Self {
            bus,
            session,
            roster,
        }
    }

    pub fn current_user(&self) -> CoreResult<Option<UserRecord>> {
        self.session.load()
    }

    pub fn login(&self, user_id: &str, role: Role) -> CoreResult<LoginOutcome> {
        let span = action_span("login");
        let _enter = span.enter();

        let user_id = user_id.trim();
        if user_id.is_empty() {
            tracing::info!("login rejected: empty user id");
            self.bus.publish(Notice::warning(EMPTY_USER_ID_MESSAGE).into());
            return Ok(LoginOutcome::Rejected);
        }

        let user = UserRecord::new(user_id, role);
        if let Some(previous) = self.session.load()? {
            if previous.user_id != user.user_id {
                tracing::warn!(previous = %previous.user_id, "replacing an existing session");
            }
        }
        let added = self.roster.insert_if_absent(&user)?;
        if let Err(e) = self.session.save(&user) {
            if added {
                if let Err(undo) = self.roster.remove(&user.user_id) {
                    log_error("undoing roster insert after failed login", &undo);
                }
            }
            return Err(e);
        }
        tracing::info!(user_id = %user.user_id, role = %user.role, roster_added = added, "user logged in");

        self.bus.publish(Event::UserLoggedIn(user.clone()));
        self.bus.publish(Notice::success(welcome_message(&user.user_id)).into());
        Ok(LoginOutcome::LoggedIn(user))
    }

    pub fn logout(&self) -> CoreResult<LogoutOutcome> {
        let span = action_span("logout");
        let _enter = span.enter();

        let current = self.session.load()?;
        self.session.clear()?;
        if let Some(user) = &current {
            let removed = match self.roster.remove(&user.user_id) {
                Ok(removed) => removed,
                Err(e) => {
                    if let Err(undo) = self.session.save(user) {
                        log_error("restoring session after failed logout", &undo);
                    }
                    return Err(e);
                }
            };
            tracing::info!(user_id = %user.user_id, roster_removed = removed, "user logged out");
        } else {
            tracing::info!("logout without an active session");
        }

        self.bus.publish(Event::UserLoggedOut);
        self.bus.publish(Notice::info(LOGGED_OUT_MESSAGE).into());
        Ok(match current {
            Some(user) => LogoutOutcome::LoggedOut(user),
            None => LogoutOutcome::NoSession,
        })
    }
}
