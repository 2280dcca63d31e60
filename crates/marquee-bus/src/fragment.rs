//! Fragment-side mirror of the identity state.
//!
//! A fragment mounts an [`IdentityView`] once: it reads the stores, then
//! follows `userLoggedIn` / `userLoggedOut` instead of re-reading them.

use crate::bus::{EventBus, Subscription};
use crate::event::{Event, Topic};
use marquee_core::error::log_error;
use marquee_core::{RosterStore, SessionStore, UserRecord};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessLevel {
    Admin,
    Manager,
    Customer,
}

impl AccessLevel {
    pub fn for_user(user: &UserRecord) -> Self {
        if user.has_permission("manage_users") {
            AccessLevel::Admin
        } else if user.has_permission("view_department_reports") {
            AccessLevel::Manager
        } else {
            AccessLevel::Customer
        }
    }
}

#[derive(Default)]
struct Mirror {
    current: Option<UserRecord>,
    roster: Vec<UserRecord>,
}

#[derive(Clone)]
pub struct IdentityView {
    mirror: Arc<Mutex<Mirror>>,
    subscriptions: Vec<Subscription>,
}

fn lock(mirror: &Mutex<Mirror>) -> MutexGuard<'_, Mirror> {
    mirror.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl IdentityView {
    /// Loads (and migrates) the stored identity and roster, then starts
    /// following login/logout events. Storage failures are logged and the
    /// view starts empty.
    pub fn mount(bus: &EventBus, session: &SessionStore, roster: &RosterStore) -> Self {
        let current = session.load().unwrap_or_else(|e| {
            log_error("loading session record", &e);
            None
        });
        let roster = roster.load().unwrap_or_else(|e| {
            log_error("loading active roster", &e);
            Vec::new()
        });
        let mirror = Arc::new(Mutex::new(Mirror { current, roster }));

        let on_login = {
            let mirror = mirror.clone();
            bus.subscribe(Topic::UserLoggedIn, move |event| {
                if let Event::UserLoggedIn(user) = event {
                    let mut state = lock(&mirror);
                    if !state.roster.iter().any(|u| u.user_id == user.user_id) {
                        state.roster.push(user.clone());
                    }
                    state.current = Some(user.clone());
                }
            })
        };
        let on_logout = {
            let mirror = mirror.clone();
            bus.subscribe(Topic::UserLoggedOut, move |_| {
                let mut state = lock(&mirror);
                if let Some(user) = state.current.take() {
                    state.roster.retain(|u| u.user_id != user.user_id);
                }
            })
        };

        Self {
            mirror,
            subscriptions: vec![on_login, on_logout],
        }
    }

    pub fn current_user(&self) -> Option<UserRecord> {
        lock(&self.mirror).current.clone()
    }

    pub fn is_logged_in(&self) -> bool {
        lock(&self.mirror).current.is_some()
    }

    pub fn has_permission(&self, name: &str) -> bool {
        lock(&self.mirror)
            .current
            .as_ref()
            .is_some_and(|u| u.has_permission(name))
    }

    pub fn access_level(&self) -> Option<AccessLevel> {
        lock(&self.mirror).current.as_ref().map(AccessLevel::for_user)
    }

    pub fn active_users(&self) -> Vec<UserRecord> {
        lock(&self.mirror).roster.clone()
    }

    pub fn unmount(&self) {
        for subscription in &self.subscriptions {
            subscription.unsubscribe();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthService;
    use marquee_core::{KeyValueStore, MemoryStore, Role};

    fn setup() -> (EventBus, MemoryStore, SessionStore, RosterStore) {
        let backend = MemoryStore::new();
        let shared: Arc<dyn KeyValueStore> = Arc::new(backend.clone());
        (
            EventBus::new(),
            backend,
            SessionStore::new(shared.clone(), "user"),
            RosterStore::new(shared, "activeUsers"),
        )
    }

    #[test]
    fn access_levels_follow_permissions() {
        assert_eq!(
            AccessLevel::for_user(&UserRecord::new("a", Role::Admin)),
            AccessLevel::Admin
        );
        assert_eq!(
            AccessLevel::for_user(&UserRecord::new("m", Role::Manager)),
            AccessLevel::Manager
        );
        assert_eq!(
            AccessLevel::for_user(&UserRecord::new("c", Role::Customer)),
            AccessLevel::Customer
        );
    }

    #[test]
    fn mount_reads_and_migrates_stored_identity() {
        let (bus, backend, session, roster) = setup();
        backend.set("user", r#"{"userId":"boss","role":"admin"}"#).unwrap();
        backend
            .set("activeUsers", r#"[{"userId":"boss","role":"admin"}]"#)
            .unwrap();

        let view = IdentityView::mount(&bus, &session, &roster);

        assert!(view.is_logged_in());
        assert!(view.has_permission("manage_users"));
        assert_eq!(view.access_level(), Some(AccessLevel::Admin));
        assert!(view.active_users()[0].has_permission("view_reports"));
        assert!(backend.get("user").unwrap().unwrap().contains("permissions"));
    }

    #[test]
    fn mount_with_malformed_storage_starts_logged_out() {
        let (bus, backend, session, roster) = setup();
        backend.set("user", "nope").unwrap();
        let view = IdentityView::mount(&bus, &session, &roster);
        assert!(!view.is_logged_in());
        assert_eq!(view.access_level(), None);
    }

    #[test]
    fn view_follows_login_and_logout() {
        let (bus, _, session, roster) = setup();
        let view = IdentityView::mount(&bus, &session, &roster);
        let auth = AuthService::new(bus.clone(), session, roster);

        auth.login("user1", Role::Manager).unwrap();
        assert_eq!(view.current_user().map(|u| u.user_id).as_deref(), Some("user1"));
        assert_eq!(view.access_level(), Some(AccessLevel::Manager));
        assert_eq!(view.active_users().len(), 1);

        auth.logout().unwrap();
        assert!(!view.is_logged_in());
        assert!(!view.has_permission("book_tickets"));
        assert!(view.active_users().is_empty());
    }

    #[test]
    fn unmounted_view_stops_following() {
        let (bus, _, session, roster) = setup();
        let view = IdentityView::mount(&bus, &session, &roster);
        view.unmount();
        view.unmount();
        assert_eq!(bus.listener_count(Topic::UserLoggedIn), 0);

        AuthService::new(bus.clone(), session, roster)
            .login("user1", Role::Admin)
            .unwrap();
        assert!(!view.is_logged_in());
    }
}
