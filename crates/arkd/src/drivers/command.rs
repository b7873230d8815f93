//! Adapters that delegate to external helper commands.
//!
//! Menu navigation and store automation live outside this daemon; the
//! helpers report their result through the exit code.

use crate::capabilities::{BootDriver, UpdateTrigger};
use crate::config_store::ConfigStore;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::time;
use tracing::{debug, info, warn};

const BOOT_TIMEOUT: Duration = Duration::from_secs(20 * 60);
const UPDATE_CHECK_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Run `argv` and report whether it exited with status 0.
///
/// A command that outlives `timeout` is killed and counts as a failure.
pub async fn run_command(argv: &[String], timeout: Duration) -> Result<bool> {
    let (program, args) = argv.split_first().context("Empty command")?;
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("Failed to start {}", program))?;

    match time::timeout(timeout, child.wait()).await {
        Ok(status) => {
            let status = status.with_context(|| format!("Failed to wait for {}", program))?;
            debug!("{} exited with {}", program, status);
            Ok(status.success())
        }
        Err(_) => {
            warn!("{} did not finish within {}s, killing it", program, timeout.as_secs());
            Ok(false)
        }
    }
}

/// Boots the server through the configured `boot_command`
pub struct CommandBootDriver {
    config: Arc<ConfigStore>,
}

impl CommandBootDriver {
    pub fn new(config: Arc<ConfigStore>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl BootDriver for CommandBootDriver {
    async fn boot(&self) -> Result<bool> {
        let command = self.config.snapshot().process.boot_command.clone();
        if command.is_empty() {
            bail!("No boot_command configured");
        }
        info!("Starting the server...");
        run_command(&command, BOOT_TIMEOUT).await
    }
}

/// Runs the configured `update_check_command`; no command means nothing is pending
pub struct CommandUpdateTrigger {
    config: Arc<ConfigStore>,
}

impl CommandUpdateTrigger {
    pub fn new(config: Arc<ConfigStore>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl UpdateTrigger for CommandUpdateTrigger {
    async fn check_for_updates(&self) -> Result<bool> {
        let command = self.config.snapshot().process.update_check_command.clone();
        if command.is_empty() {
            debug!("No update_check_command configured");
            return Ok(false);
        }
        run_command(&command, UPDATE_CHECK_TIMEOUT).await
    }
}
