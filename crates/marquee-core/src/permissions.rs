use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[serde(alias = "Customer")]
    Customer,
    #[serde(alias = "Admin")]
    Admin,
    #[serde(alias = "Manager")]
    Manager,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Customer, Role::Admin, Role::Manager];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Admin => "admin",
            Role::Manager => "manager",
        }
    }

    /// Fixed role table. Records store the result denormalized, so changing
    /// an entry here only affects records created (or migrated) afterwards.
    pub fn permissions(&self) -> PermissionSet {
        let names: &[&str] = match self {
            Role::Customer => &["book_tickets", "view_own_bookings"],
            Role::Admin => &[
                "book_tickets",
                "view_all_bookings",
                "view_reports",
                "manage_users",
                "view_seat_map",
            ],
            Role::Manager => &["book_tickets", "view_department_reports", "view_seat_map"],
        };
        names.iter().copied().collect()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown role `{}`", self.0)
    }
}

impl std::error::Error for UnknownRole {}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "customer" => Ok(Role::Customer),
            "admin" => Ok(Role::Admin),
            "manager" => Ok(Role::Manager),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

/// Permission names in insertion order, without duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(Vec<String>);

impl PermissionSet {
    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|p| p == name)
    }

    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        if self.contains(&name) {
            return false;
        }
        self.0.push(name);
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = PermissionSet::default();
        for name in iter {
            set.insert(name);
        }
        set
    }
}

impl fmt::Display for PermissionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(", "))
    }
}
