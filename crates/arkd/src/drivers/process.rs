//! Process control and liveness through sysinfo.
//!
//! sysinfo refreshes are blocking, so every call runs on the blocking pool.

use crate::capabilities::{LivenessProbe, ProcessControl};
use crate::config_store::ConfigStore;
use crate::drivers::command::run_command;
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use sysinfo::System;
use tokio::process::Command;
use tracing::{debug, warn};

const RUNNING_TRIES: u32 = 3;
const RUNNING_RETRY_DELAY: Duration = Duration::from_millis(100);
const LOADED_CHECK_TIMEOUT: Duration = Duration::from_secs(60);

/// Kills and looks up processes by exact executable name
#[derive(Debug, Default)]
pub struct SysProcessControl;

impl SysProcessControl {
    pub fn new() -> Self {
        Self
    }
}

fn find_pid(name: &str) -> Option<u32> {
    let mut system = System::new();
    system.refresh_processes();
    let process = system.processes_by_exact_name(name).next()?;
    Some(process.pid().as_u32())
}

fn kill_by_name(name: &str) -> bool {
    let mut system = System::new();
    system.refresh_processes();
    for process in system.processes_by_exact_name(name) {
        if process.kill() {
            debug!("Killed {} (pid={})", name, process.pid());
            return true;
        }
        warn!("Failed to kill {} (pid={})", name, process.pid());
    }
    false
}

#[async_trait]
impl ProcessControl for SysProcessControl {
    async fn kill(&self, name: &str) -> bool {
        let name = name.to_string();
        tokio::task::spawn_blocking(move || kill_by_name(&name))
            .await
            .unwrap_or(false)
    }

    async fn get_pid(&self, name: &str) -> Option<u32> {
        let name = name.to_string();
        tokio::task::spawn_blocking(move || find_pid(&name))
            .await
            .ok()
            .flatten()
    }

    async fn stop_service(&self, name: &str) {
        let result = Command::new("net")
            .args(["stop", name])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        if let Err(e) = result {
            debug!("Could not stop service {}: {}", name, e);
        }
    }
}

/// Liveness of the configured server process.
///
/// `is_loaded` runs the configured `loaded_command`; without one, a running
/// process counts as loaded.
pub struct ServerLiveness {
    processes: Arc<SysProcessControl>,
    config: Arc<ConfigStore>,
}

impl ServerLiveness {
    pub fn new(processes: Arc<SysProcessControl>, config: Arc<ConfigStore>) -> Self {
        Self { processes, config }
    }
}

#[async_trait]
impl LivenessProbe for ServerLiveness {
    async fn is_running(&self) -> bool {
        let server = self.config.snapshot().process.server_process.clone();
        // Process enumeration can miss a process mid-refresh
        for attempt in 0..RUNNING_TRIES {
            if self.processes.get_pid(&server).await.is_some() {
                return true;
            }
            if attempt + 1 < RUNNING_TRIES {
                tokio::time::sleep(RUNNING_RETRY_DELAY).await;
            }
        }
        false
    }

    async fn is_loaded(&self) -> bool {
        let command = self.config.snapshot().process.loaded_command.clone();
        if command.is_empty() {
            return self.is_running().await;
        }
        match run_command(&command, LOADED_CHECK_TIMEOUT).await {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!("Loaded check failed: {:#}", e);
                false
            }
        }
    }
}
