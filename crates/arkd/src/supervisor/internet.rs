//! Internet guard.
//!
//! An unreachable server cannot be monitored or updated, so after
//! `outage_kill_minutes` of continuous outage the world is saved over RCON
//! (best effort) and the process is stopped. The watchdog does not relaunch
//! while `NetworkDown` is set.

use super::Timings;
use crate::capabilities::Drivers;
use crate::config_store::ConfigStore;
use crate::state::{Flag, SharedState};
use chrono::{DateTime, Local};
use std::sync::Arc;
use tokio::time;
use tracing::{debug, error, info, warn};

pub const SAVE_COMMAND: &str = "saveworld";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    /// `outage_kill_minutes` is 0
    Disabled,
    /// Previous probe still in flight
    AlreadyProbing,
    Online,
    /// Connectivity returned after an outage
    Recovered,
    /// Offline, under the threshold or server not running
    Offline,
    /// Over the threshold but a boot/wipe holds the claim
    Deferred,
    /// Over the threshold; server saved (best effort) and killed
    Killed,
}

pub struct InternetGuard {
    state: SharedState,
    config: Arc<ConfigStore>,
    drivers: Drivers,
    timings: Timings,
}

impl InternetGuard {
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

    pub async fn tick(&self) -> GuardOutcome {
        self.tick_at(Local::now()).await
    }

    pub async fn tick_at(&self, now: DateTime<Local>) -> GuardOutcome {
        let config = self.config.snapshot();
        let threshold_minutes = config.settings.outage_kill_minutes;
        if threshold_minutes == 0 {
            debug!("Not checking internet since outage_kill_minutes is 0");
            // An outage flagged before the guard was switched off must not
            // keep the watchdog blocked
            if self.state.set(Flag::NetworkDown, false) {
                info!("Internet guard disabled, clearing the outage flag");
            }
            return GuardOutcome::Disabled;
        }

        let Some(_probing) = self.state.try_claim(Flag::Probing) else {
            return GuardOutcome::AlreadyProbing;
        };

        debug!("Checking internet");
        if self.drivers.connectivity.check().await {
            return self.on_connected(now).await;
        }

        if !self.state.set(Flag::NetworkDown, true) {
            warn!("Internet is down!");
        }

        let down_secs = (now - self.state.last_online_at()).num_seconds();
        let threshold_secs = i64::try_from(threshold_minutes)
            .ok()
            .and_then(|m| m.checked_mul(60))
            .unwrap_or(i64::MAX);
        // Strictly greater: exactly N minutes down does not kill
        let over_threshold = down_secs > threshold_secs;
        if !over_threshold {
            return GuardOutcome::Offline;
        }

        if self.state.is_set(Flag::Booting) {
            warn!("Internet down for {}s but a boot is in progress, waiting", down_secs);
            return GuardOutcome::Deferred;
        }
        if !self.drivers.liveness.is_running().await {
            return GuardOutcome::Offline;
        }

        error!("Internet has been down for {}s, shutting down the server!", down_secs);
        match self.drivers.console.execute(SAVE_COMMAND).await {
            Ok(response) => warn!("Server map saved before killing: {}", response.trim()),
            Err(e) => error!("Server failed to save before killing: {:#}", e),
        }
        self.drivers
            .process
            .kill(&config.process.server_process)
            .await;
        GuardOutcome::Killed
    }

    async fn on_connected(&self, now: DateTime<Local>) -> GuardOutcome {
        self.state.mark_online(now);
        if !self.state.is_set(Flag::NetworkDown) {
            return GuardOutcome::Online;
        }

        warn!(
            "Internet is back up! Allowing reboots in {}s",
            self.timings.recovery_cooldown.as_secs()
        );
        time::sleep(self.timings.recovery_cooldown).await;
        self.state.set(Flag::NetworkDown, false);
        GuardOutcome::Recovered
    }
}
