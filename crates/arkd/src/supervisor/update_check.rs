//! Periodic store update check.
//!
//! The store only downloads updates while it is open and has been asked to
//! look. This task opens that window under the `CheckingUpdates` claim and
//! closes the store again when nothing is pending.

use super::Timings;
use crate::capabilities::Drivers;
use crate::config_store::ConfigStore;
use crate::state::{Flag, SharedState};
use std::sync::Arc;
use tokio::time;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateCheckOutcome {
    Disabled,
    Skipped,
    UpdatePending,
    NoUpdate,
    Failed,
}

pub struct UpdateChecker {
    state: SharedState,
    config: Arc<ConfigStore>,
    drivers: Drivers,
    timings: Timings,
}

impl UpdateChecker {
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

    pub async fn tick(&self) -> UpdateCheckOutcome {
        let config = self.config.snapshot();
        if !config.settings.auto_update {
            return UpdateCheckOutcome::Disabled;
        }
        if let Some(flag) =
            self.state
                .first_set(&[Flag::NetworkDown, Flag::Booting, Flag::Downloading])
        {
            debug!("Skipping update check, {} is set", flag);
            return UpdateCheckOutcome::Skipped;
        }
        let Some(_claim) = self.state.try_claim(Flag::CheckingUpdates) else {
            return UpdateCheckOutcome::Skipped;
        };

        debug!("Checking for updates");
        let store = &config.process.store_process;
        self.drivers.process.kill(store).await;
        time::sleep(self.timings.store_settle).await;

        match self.drivers.updates.check_for_updates().await {
            Ok(true) => {
                info!("Store reports an update pending");
                UpdateCheckOutcome::UpdatePending
            }
            Ok(false) => {
                self.drivers.process.kill(store).await;
                UpdateCheckOutcome::NoUpdate
            }
            Err(e) => {
                error!("Update check failed: {:#}", e);
                UpdateCheckOutcome::Failed
            }
        }
    }
}
