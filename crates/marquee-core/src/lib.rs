pub mod config;
pub mod error;
pub mod logging;
pub mod permissions;
pub mod session;
pub mod store;
pub mod user;

pub use config::{CoreConfig, LoggingConfig, NotificationConfig, StorageConfig};
pub use error::{CoreError, CoreResult};
pub use permissions::{PermissionSet, Role};
pub use session::{RosterStore, SessionStore};
pub use store::{FileStore, KeyValueStore, MemoryStore};
pub use user::UserRecord;
