//! arkd - unattended supervisor for a dedicated game server.
//!
//! Keeps the server process alive, follows vendor updates, runs scheduled
//! wipes and stops the server during long internet outages. All tasks share
//! one `SupervisorState`; the `Booting` flag is the single exclusive claim
//! over the server process.

pub mod capabilities;
pub mod config_store;
pub mod drivers;
pub mod logging;
pub mod notifier;
pub mod state;
pub mod supervisor;

pub use capabilities::Drivers;
pub use config_store::ConfigStore;
pub use state::{create_shared_state, Flag, SharedState, SupervisorState};
pub use supervisor::{Supervisor, Timings};
