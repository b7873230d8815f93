//! Capability traits for everything outside the supervisor core.
//!
//! Production code wires the adapters in `drivers`; tests wire in-memory
//! fakes, so the state machine runs without a real server, GUI or network.

use anyhow::Result;
use ark_common::{Notification, UpdateEvent};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// Whether the supervised process is up, and whether it finished loading
#[async_trait]
pub trait LivenessProbe: Send + Sync {
    async fn is_running(&self) -> bool;

    async fn is_loaded(&self) -> bool;
}

/// Launches the server and drives it through its startup menus.
///
/// `Ok(false)` is an ordinary boot failure (retried after a backoff);
/// `Err` is an unexpected fault.
#[async_trait]
pub trait BootDriver: Send + Sync {
    async fn boot(&self) -> Result<bool>;
}

/// Recent system log records, most recent first
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn poll_recent(&self) -> Result<Vec<UpdateEvent>>;
}

/// Fire-and-forget delivery; implementations log their own failures
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification);
}

#[async_trait]
pub trait RemoteConsole: Send + Sync {
    async fn execute(&self, command: &str) -> Result<String>;
}

/// Copies a backup config file into the live config directory
#[async_trait]
pub trait FileSync: Send + Sync {
    async fn sync(&self, source: &Path) -> bool;
}

#[async_trait]
pub trait ProcessControl: Send + Sync {
    /// Kill the first process with this exact name; false if none was killed
    async fn kill(&self, name: &str) -> bool;

    async fn get_pid(&self, name: &str) -> Option<u32>;

    /// Best effort; errors are swallowed
    async fn stop_service(&self, name: &str);
}

#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn check(&self) -> bool;
}

/// Deletes the map save data; returns the number of removed files
#[async_trait]
pub trait WipeRoutine: Send + Sync {
    async fn wipe(&self, include_cluster: bool) -> Result<usize>;
}

/// Asks the store to look for updates; `Ok(true)` when one is pending or running
#[async_trait]
pub trait UpdateTrigger: Send + Sync {
    async fn check_for_updates(&self) -> Result<bool>;
}

/// Every external collaborator the tasks need
#[derive(Clone)]
pub struct Drivers {
    pub liveness: Arc<dyn LivenessProbe>,
    pub boot: Arc<dyn BootDriver>,
    pub events: Arc<dyn EventSource>,
    pub notifier: Arc<dyn Notifier>,
    pub console: Arc<dyn RemoteConsole>,
    pub files: Arc<dyn FileSync>,
    pub process: Arc<dyn ProcessControl>,
    pub connectivity: Arc<dyn ConnectivityProbe>,
    pub wipe: Arc<dyn WipeRoutine>,
    pub updates: Arc<dyn UpdateTrigger>,
}
