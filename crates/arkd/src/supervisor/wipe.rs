//! Scheduled map wipes.
//!
//! Fires when local time matches a configured `MM/DD HH:MM` to the minute.
//! The tick interval is shorter than a minute, so the last fired minute is
//! remembered and a second match inside it is ignored.

use super::Timings;
use crate::capabilities::Drivers;
use crate::config_store::ConfigStore;
use crate::state::{Flag, SharedState};
use ark_common::{Notification, Severity};
use chrono::{Local, NaiveDateTime, Timelike};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::time;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WipeOutcome {
    /// Auto wipe off or no wipe times configured
    Disabled,
    NotDue,
    /// Already wiped during this minute
    AlreadyFired,
    /// Boot claim held by another task
    Busy,
    Wiped,
}

pub struct WipeScheduler {
    state: SharedState,
    config: Arc<ConfigStore>,
    drivers: Drivers,
    timings: Timings,
    last_fired: Mutex<Option<NaiveDateTime>>,
}

impl WipeScheduler {
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
            last_fired: Mutex::new(None),
        }
    }

    pub async fn tick(&self) -> WipeOutcome {
        self.tick_at(Local::now().naive_local()).await
    }

    pub async fn tick_at(&self, now: NaiveDateTime) -> WipeOutcome {
        debug!("Checking wipe schedule");
        // Rejected reloads are logged by the store and leave the old snapshot
        let _ = self.config.reload_if_changed().await;
        let config = self.config.snapshot();

        if !config.settings.auto_wipe || config.settings.wipe_times.is_empty() {
            return WipeOutcome::Disabled;
        }
        if !config.wipe_due(&now) {
            return WipeOutcome::NotDue;
        }

        let minute = truncate_to_minute(now);
        if *self.last_fired.lock().unwrap_or_else(PoisonError::into_inner) == Some(minute) {
            return WipeOutcome::AlreadyFired;
        }

        let Some(claim) = self.state.try_claim(Flag::Booting) else {
            info!("Wipe is due but a boot is in progress, will retry");
            return WipeOutcome::Busy;
        };
        *self.last_fired.lock().unwrap_or_else(PoisonError::into_inner) = Some(minute);

        warn!("WIPING SERVER");
        self.drivers
            .notifier
            .notify(Notification::new(
                "WIPING SERVER",
                "Shutting down to wipe...",
                Severity::Warning,
            ))
            .await;

        self.drivers
            .process
            .kill(&config.process.server_process)
            .await;
        time::sleep(self.timings.wipe_kill_settle).await;

        match self.drivers.wipe.wipe(config.settings.cluster_wipe).await {
            Ok(count) => info!("Wipe finished, deleted {} files", count),
            Err(e) => error!("Wipe failed: {:#}", e),
        }

        time::sleep(self.timings.wipe_settle).await;
        drop(claim);
        WipeOutcome::Wiped
    }
}

fn truncate_to_minute(now: NaiveDateTime) -> NaiveDateTime {
    now.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now)
}
