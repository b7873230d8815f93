//! Production adapters for the capability traits.

pub mod command;
pub mod connectivity;
pub mod eventlog;
pub mod files;
pub mod process;
pub mod rcon;

use crate::capabilities::Drivers;
use crate::config_store::ConfigStore;
use crate::notifier::WebhookNotifier;
use anyhow::Result;
use std::sync::Arc;

pub use command::{CommandBootDriver, CommandUpdateTrigger};
pub use connectivity::HttpConnectivity;
pub use eventlog::PowerShellEventSource;
pub use files::{FsWipe, IniSync};
pub use process::{ServerLiveness, SysProcessControl};
pub use rcon::RconConsole;

/// Wire every capability to its real adapter.
///
/// The RCON console is also returned on its own so its credentials can be
/// refreshed when the config changes.
pub fn build(config: Arc<ConfigStore>) -> Result<(Drivers, Arc<RconConsole>)> {
    let processes = Arc::new(SysProcessControl::new());
    let console = Arc::new(RconConsole::new(config.clone()));

    let drivers = Drivers {
        liveness: Arc::new(ServerLiveness::new(processes.clone(), config.clone())),
        boot: Arc::new(CommandBootDriver::new(config.clone())),
        events: Arc::new(PowerShellEventSource::new()),
        notifier: Arc::new(WebhookNotifier::new(config.clone())?),
        console: console.clone(),
        files: Arc::new(IniSync::new(config.clone())),
        process: processes,
        connectivity: Arc::new(HttpConnectivity::new()?),
        wipe: Arc::new(FsWipe::new(config.clone())),
        updates: Arc::new(CommandUpdateTrigger::new(config)),
    };
    Ok((drivers, console))
}
