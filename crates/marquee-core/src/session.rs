//! Session slot and active-user roster on top of a [`KeyValueStore`].
//!
//! Both stores migrate legacy records on load and write the migrated form
//! back, so a record is backfilled at most once. Malformed JSON is logged
//! and reads as "nothing stored". Roster entries are parsed one by one: an
//! unreadable entry is skipped on read but written back untouched.

use crate::error::{CoreError, CoreResult};
use crate::store::KeyValueStore;
use crate::user::{StoredUser, UserRecord};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

fn read_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> CoreResult<Option<T>> {
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            tracing::warn!(key = key, error = %e, "ignoring malformed stored record");
            Ok(None)
        }
    }
}

/// Single-record slot for the current identity.
#[derive(Clone)]
pub struct SessionStore {
    backend: Arc<dyn KeyValueStore>,
    key: String,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
        }
    }

    pub fn load(&self) -> CoreResult<Option<UserRecord>> {
        let Some(stored) = read_json::<StoredUser>(self.backend.as_ref(), &self.key)? else {
            return Ok(None);
        };
        let (user, migrated) = stored.migrate();
        if migrated {
            tracing::info!(user_id = %user.user_id, "backfilled permissions on session record");
            self.save(&user)?;
        }
        Ok(Some(user))
    }

    pub fn save(&self, user: &UserRecord) -> CoreResult<()> {
        self.backend.set(&self.key, &serde_json::to_string(user)?)
    }

    pub fn clear(&self) -> CoreResult<()> {
        self.backend.remove(&self.key)
    }
}

/// One element of the stored roster list. Entries that do not parse as a
/// user record are kept verbatim so a write never drops them.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
enum RosterEntry {
    User(UserRecord),
    Unreadable(serde_json::Value),
}

enum RosterState {
    Missing,
    /// The stored value is not a JSON list at all.
    Damaged,
    Entries {
        entries: Vec<RosterEntry>,
        migrated: bool,
    },
}

/// Collection slot for every logged-in identity, unique by `user_id`.
#[derive(Clone)]
pub struct RosterStore {
    backend: Arc<dyn KeyValueStore>,
    key: String,
}

impl RosterStore {
    pub fn new(backend: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
        }
    }

    fn read(&self) -> CoreResult<RosterState> {
        let Some(raw) = self.backend.get(&self.key)? else {
            return Ok(RosterState::Missing);
        };
        let values: Vec<serde_json::Value> = match serde_json::from_str(&raw) {
            Ok(values) => values,
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "ignoring malformed roster");
                return Ok(RosterState::Damaged);
            }
        };

        let mut migrated = false;
        let entries = values
            .into_iter()
            .enumerate()
            .map(|(index, value)| match StoredUser::deserialize(&value) {
                Ok(stored) => {
                    let (user, backfilled) = stored.migrate();
                    migrated |= backfilled;
                    RosterEntry::User(user)
                }
                Err(e) => {
                    tracing::warn!(key = %self.key, index, error = %e, "skipping unreadable roster entry");
                    RosterEntry::Unreadable(value)
                }
            })
            .collect();
        Ok(RosterState::Entries { entries, migrated })
    }

    /// Readable entries in stored order. A malformed list reads as empty and
    /// unreadable entries are skipped.
    pub fn load(&self) -> CoreResult<Vec<UserRecord>> {
        let entries = match self.read()? {
            RosterState::Missing | RosterState::Damaged => return Ok(Vec::new()),
            RosterState::Entries { entries, migrated } => {
                if migrated {
                    tracing::info!(count = entries.len(), "backfilled permissions on roster");
                    self.write(&entries)?;
                }
                entries
            }
        };
        Ok(entries
            .into_iter()
            .filter_map(|entry| match entry {
                RosterEntry::User(user) => Some(user),
                RosterEntry::Unreadable(_) => None,
            })
            .collect())
    }

    pub fn contains(&self, user_id: &str) -> CoreResult<bool> {
        Ok(self.load()?.iter().any(|u| u.user_id == user_id))
    }

    /// Appends `user` unless an entry with the same id exists. Returns
    /// whether the roster changed. Fails without writing when the stored
    /// value is not a list, since appending would replace it.
    pub fn insert_if_absent(&self, user: &UserRecord) -> CoreResult<bool> {
        let mut entries = match self.read()? {
            RosterState::Missing => Vec::new(),
            RosterState::Damaged => {
                return Err(CoreError::Storage {
                    key: self.key.clone(),
                    reason: "stored roster is not a list; refusing to overwrite it".to_string(),
                })
            }
            RosterState::Entries { entries, .. } => entries,
        };
        if entries.iter().any(|e| matches!(e, RosterEntry::User(u) if u.user_id == user.user_id)) {
            return Ok(false);
        }
        entries.push(RosterEntry::User(user.clone()));
        self.write(&entries)?;
        Ok(true)
    }

    /// Removes the entry for `user_id`. Returns whether one was present. A
    /// stored value that is not a list is left untouched.
    pub fn remove(&self, user_id: &str) -> CoreResult<bool> {
        let RosterState::Entries { mut entries, .. } = self.read()? else {
            return Ok(false);
        };
        let before = entries.len();
        entries.retain(|e| !matches!(e, RosterEntry::User(u) if u.user_id == user_id));
        if entries.len() == before {
            return Ok(false);
        }
        self.write(&entries)?;
        Ok(true)
    }

    fn write(&self, entries: &[RosterEntry]) -> CoreResult<()> {
        self.backend.set(&self.key, &serde_json::to_string(entries)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::Role;
    use crate::store::MemoryStore;

    fn stores() -> (MemoryStore, SessionStore, RosterStore) {
        let backend = MemoryStore::new();
        let shared: Arc<dyn KeyValueStore> = Arc::new(backend.clone());
        (
            backend,
            SessionStore::new(shared.clone(), "user"),
            RosterStore::new(shared, "activeUsers"),
        )
    }

    #[test]
    fn session_save_load_clear() {
        let (_, session, _) = stores();
        assert_eq!(session.load().unwrap(), None);

        let user = UserRecord::new("user1", Role::Admin);
        session.save(&user).unwrap();
        assert_eq!(session.load().unwrap(), Some(user));

        session.clear().unwrap();
        assert_eq!(session.load().unwrap(), None);
    }

    #[test]
    fn malformed_session_reads_as_absent() {
        let (backend, session, _) = stores();
        backend.set("user", "{oops").unwrap();
        assert_eq!(session.load().unwrap(), None);
        assert_eq!(backend.get("user").unwrap().as_deref(), Some("{oops"));
    }

    #[test]
    fn legacy_session_is_migrated_and_written_back() {
        let (backend, session, _) = stores();
        backend.set("user", r#"{"userId":"old","role":"admin"}"#).unwrap();

        let user = session.load().unwrap().unwrap();
        assert!(user.has_permission("manage_users"));

        let raw: serde_json::Value =
            serde_json::from_str(&backend.get("user").unwrap().unwrap()).unwrap();
        assert_eq!(raw["permissions"][3], "manage_users");
    }

    #[test]
    fn legacy_roster_is_migrated_and_written_back() {
        let (backend, _, roster) = stores();
        backend
            .set(
                "activeUsers",
                r#"[{"userId":"a","role":"customer"},{"userId":"b","role":"manager","permissions":["x"]}]"#,
            )
            .unwrap();

        let users = roster.load().unwrap();
        assert_eq!(users[0].permissions, Role::Customer.permissions());
        assert_eq!(users[1].permissions.iter().collect::<Vec<_>>(), vec!["x"]);

        let raw: Vec<serde_json::Value> =
            serde_json::from_str(&backend.get("activeUsers").unwrap().unwrap()).unwrap();
        assert_eq!(raw[0]["permissions"], serde_json::json!(["book_tickets", "view_own_bookings"]));
        assert_eq!(raw[1]["permissions"], serde_json::json!(["x"]));
    }

    #[test]
    fn roster_insert_is_idempotent_per_id() {
        let (_, _, roster) = stores();
        assert!(roster.insert_if_absent(&UserRecord::new("u1", Role::Customer)).unwrap());
        assert!(!roster.insert_if_absent(&UserRecord::new("u1", Role::Admin)).unwrap());

        let users = roster.load().unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].role, Role::Customer);
    }

    #[test]
    fn roster_remove_keeps_order_of_others() {
        let (_, _, roster) = stores();
        for id in ["a", "b", "c"] {
            roster.insert_if_absent(&UserRecord::new(id, Role::Customer)).unwrap();
        }
        assert!(roster.remove("b").unwrap());
        assert!(!roster.remove("b").unwrap());

        let ids: Vec<_> = roster.load().unwrap().into_iter().map(|u| u.user_id).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert!(!roster.contains("b").unwrap());
    }

    #[test]
    fn malformed_roster_reads_as_empty() {
        let (backend, _, roster) = stores();
        backend.set("activeUsers", "not json").unwrap();
        assert!(roster.load().unwrap().is_empty());
    }

    #[test]
    fn malformed_roster_is_never_overwritten() {
        let (backend, _, roster) = stores();
        backend.set("activeUsers", "not json").unwrap();

        let err = roster
            .insert_if_absent(&UserRecord::new("carol", Role::Customer))
            .unwrap_err();
        assert!(matches!(err, CoreError::Storage { ref key, .. } if key == "activeUsers"));
        assert!(!roster.remove("carol").unwrap());
        assert_eq!(backend.get("activeUsers").unwrap().as_deref(), Some("not json"));
    }

    const MIXED_ROSTER: &str = r#"[{"userId":"alice","role":"admin","permissions":["manage_users"]},{"userId":"bob","role":"guest"}]"#;

    #[test]
    fn unreadable_entry_does_not_hide_the_others() {
        let (backend, _, roster) = stores();
        backend.set("activeUsers", MIXED_ROSTER).unwrap();

        let ids: Vec<_> = roster.load().unwrap().into_iter().map(|u| u.user_id).collect();
        assert_eq!(ids, vec!["alice"]);
        assert!(!roster.contains("bob").unwrap());
    }

    #[test]
    fn writes_keep_unreadable_entries_verbatim() {
        let (backend, _, roster) = stores();
        backend.set("activeUsers", MIXED_ROSTER).unwrap();

        assert!(roster.insert_if_absent(&UserRecord::new("carol", Role::Customer)).unwrap());
        let raw: Vec<serde_json::Value> =
            serde_json::from_str(&backend.get("activeUsers").unwrap().unwrap()).unwrap();
        assert_eq!(raw.len(), 3);
        assert_eq!(raw[0]["userId"], "alice");
        assert_eq!(raw[1], serde_json::json!({"userId": "bob", "role": "guest"}));
        assert_eq!(raw[2]["userId"], "carol");

        assert!(roster.remove("alice").unwrap());
        let raw: Vec<serde_json::Value> =
            serde_json::from_str(&backend.get("activeUsers").unwrap().unwrap()).unwrap();
        assert_eq!(raw[0], serde_json::json!({"userId": "bob", "role": "guest"}));
        assert_eq!(raw[1]["userId"], "carol");
    }

    #[test]
    fn legacy_write_back_keeps_unreadable_entries() {
        let (backend, _, roster) = stores();
        backend
            .set("activeUsers", r#"[{"userId":"a","role":"customer"},42]"#)
            .unwrap();

        assert_eq!(roster.load().unwrap().len(), 1);
        let raw: Vec<serde_json::Value> =
            serde_json::from_str(&backend.get("activeUsers").unwrap().unwrap()).unwrap();
        assert_eq!(raw[0]["permissions"], serde_json::json!(["book_tickets", "view_own_bookings"]));
        assert_eq!(raw[1], serde_json::json!(42));
    }
}
