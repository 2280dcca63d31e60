pub mod auth;
pub mod bus;
pub mod event;
pub mod fragment;
pub mod notifications;
pub mod registry;

pub use auth::{AuthService, LoginOutcome, LogoutOutcome};
pub use bus::{EventBus, Subscription};
pub use event::{Event, Notice, Severity, Topic};
pub use fragment::{AccessLevel, IdentityView};
pub use notifications::{NotificationCenter, Toast, ToastId};
pub use registry::{global_bus, BusRegistry};
