//! ArkHandler Common - configuration, update events and notification types
//! shared by the daemon and its tests.

pub mod config;
pub mod error;
pub mod events;
pub mod notify;

pub use config::{Config, WipeTime};
pub use error::ConfigError;
pub use events::{SeenUpdateEvent, UpdateEvent, UpdateEventKind};
pub use notify::{Notification, Severity};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
