//! Watchdog - keeps the server running and fully loaded.
//!
//! When the server is down (or up but never finished loading) and no other
//! task has a reason to keep it down, the watchdog claims `Booting` and runs
//! the reboot sequence. The claim is dropped on every exit path.

use super::Timings;
use crate::capabilities::Drivers;
use crate::config_store::ConfigStore;
use crate::state::{Flag, SharedState};
use anyhow::{Context, Result};
use ark_common::{Config, Notification, Severity};
use std::sync::Arc;
use tokio::time;
use tracing::{debug, error, info, warn};

/// Any of these set means some other task wants the server left alone
pub const BLOCKERS: [Flag; 5] = [
    Flag::Downloading,
    Flag::Installing,
    Flag::Booting,
    Flag::NetworkDown,
    Flag::CheckingUpdates,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogOutcome {
    /// Server up and loaded
    Healthy,
    /// Another task holds the boot claim
    BootInProgress,
    /// Server down, but a blocker flag is set
    Blocked(Flag),
    Rebooted,
    /// Boot driver reported failure; retried next tick
    BootFailed,
    /// Booted but never reported loaded; server was killed
    LoadTimeout,
    /// Unexpected error; cooldown served before releasing the claim
    Faulted,
}

pub struct Watchdog {
    state: SharedState,
    config: Arc<ConfigStore>,
    drivers: Drivers,
    timings: Timings,
}

impl Watchdog {
    pub fn new(
        state: SharedState,
        config: Arc<ConfigStore>,
        drivers: Drivers,
        timings: Timings,
    ) -> Self {
        Self {
            state,
            config,
            drivers,
            timings,
        }
    }

    pub async fn tick(&self) -> WatchdogOutcome {
        if self.state.is_set(Flag::Booting) {
            debug!("Booting in process, skipping server check...");
            return WatchdogOutcome::BootInProgress;
        }

        let config = self.config.snapshot();
        let server = &config.process.server_process;

        let running = self.drivers.liveness.is_running().await;
        let loaded = running && self.drivers.liveness.is_loaded().await;
        if running && loaded {
            if !self.state.set(Flag::Running, true) {
                match self.drivers.process.get_pid(server).await {
                    Some(pid) => info!("Server is running (PID {})", pid),
                    None => info!("Server is running"),
                }
            }
            return WatchdogOutcome::Healthy;
        }

        if self.state.set(Flag::Running, false) {
            if running {
                warn!("Server is running but no longer loaded");
            } else {
                warn!("Server is no longer running");
            }
        }

        if let Some(flag) = self.state.first_set(&BLOCKERS) {
            debug!("Server down but {} is set, not rebooting", flag);
            return WatchdogOutcome::Blocked(flag);
        }

        let Some(claim) = self.state.try_claim(Flag::Booting) else {
            return WatchdogOutcome::BootInProgress;
        };

        let outcome = match self.reboot(&config).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Critical error in reboot sequence: {:#}", e);
                self.notify(
                    &config,
                    Notification::new(
                        "CRITICAL ERROR",
                        format!(
                            "```\n{:#}\n```Sleeping for {} minutes before trying again",
                            e,
                            self.timings.error_cooldown.as_secs() / 60
                        ),
                        Severity::Critical,
                    ),
                )
                .await;
                time::sleep(self.timings.error_cooldown).await;
                WatchdogOutcome::Faulted
            }
        };

        drop(claim);
        outcome
    }

    async fn reboot(&self, config: &Config) -> Result<WatchdogOutcome> {
        for source in config.sync_sources() {
            if !self.drivers.files.sync(&source).await {
                warn!("Config sync failed for {}, booting anyway", source.display());
            }
        }

        if self.drivers.process.kill(&config.process.store_process).await {
            debug!("Killed stray {}", config.process.store_process);
        }

        self.notify(
            config,
            Notification::new("Server Down", "Beginning reboot sequence...", Severity::Warning),
        )
        .await;
        info!("Beginning reboot sequence");

        let booted = self.drivers.boot.boot().await.context("Boot driver failed")?;
        if !booted {
            warn!(
                "Boot failed, retrying in {}s",
                self.timings.boot_failure_backoff.as_secs()
            );
            self.notify(
                config,
                Notification::new("Boot Failed", "Trying again...", Severity::Warning),
            )
            .await;
            time::sleep(self.timings.boot_failure_backoff).await;
            return Ok(WatchdogOutcome::BootFailed);
        }

        self.notify(
            config,
            Notification::new("Booting", "Loading server files...", Severity::Info),
        )
        .await;
        time::sleep(self.timings.boot_settle).await;
        self.drivers
            .process
            .stop_service(&config.process.license_service)
            .await;

        if !self.wait_for_loaded().await {
            warn!(
                "Server did not finish loading within {}s, killing it",
                self.timings.load_timeout.as_secs()
            );
            self.notify(
                config,
                Notification::new("Loading Failed", "Retrying...", Severity::Warning),
            )
            .await;
            self.drivers.process.kill(&config.process.server_process).await;
            return Ok(WatchdogOutcome::LoadTimeout);
        }

        info!("Reboot complete");
        self.notify(
            config,
            Notification::new(
                "Reboot Complete",
                "Server should be back online.",
                Severity::Success,
            ),
        )
        .await;
        self.state.set(Flag::Running, true);
        Ok(WatchdogOutcome::Rebooted)
    }

    /// Poll for the loaded signal until the load timeout. Gives up early if
    /// the process disappears.
    async fn wait_for_loaded(&self) -> bool {
        let liveness = &self.drivers.liveness;
        let poll = async {
            loop {
                if !liveness.is_running().await {
                    warn!("Server exited while loading");
                    return false;
                }
                if liveness.is_loaded().await {
                    return true;
                }
                time::sleep(self.timings.load_poll).await;
            }
        };
        time::timeout(self.timings.load_timeout, poll)
            .await
            .unwrap_or(false)
    }

    /// Reboot notifications are muted in debug mode
    async fn notify(&self, config: &Config, notification: Notification) {
        if config.settings.debug {
            debug!("Debug mode, not sending '{}'", notification.title);
            return;
        }
        self.drivers.notifier.notify(notification).await;
    }
}
