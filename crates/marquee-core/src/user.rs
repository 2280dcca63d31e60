use crate::permissions::{PermissionSet, Role};
use serde::{Deserialize, Serialize};

/// Identity record shared by the session slot, the roster and the
/// `userLoggedIn` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub user_id: String,
    pub role: Role,
    pub permissions: PermissionSet,
}

impl UserRecord {
    /// Builds a record with permissions taken from the role table.
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
            permissions: role.permissions(),
        }
    }

    pub fn has_permission(&self, name: &str) -> bool {
        self.permissions.contains(name)
    }
}

/// On-disk shape. Records written before permissions were denormalized
/// have no `permissions` field.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StoredUser {
    user_id: String,
    role: Role,
    #[serde(default)]
    permissions: Option<PermissionSet>,
}

impl StoredUser {
    /// Returns the current record form and whether a backfill happened.
    pub(crate) fn migrate(self) -> (UserRecord, bool) {
        match self.permissions {
            Some(permissions) => (
                UserRecord {
                    user_id: self.user_id,
                    role: self.role,
                    permissions,
                },
                false,
            ),
            None => (UserRecord::new(self.user_id, self.role), true),
        }
    }
}
