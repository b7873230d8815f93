//! Update event monitor.
//!
//! The store gives no callback for updates, so the system log is read as a
//! three stage lifecycle: download started (44), install started (43),
//! install complete (19). Completion kills the server so the watchdog
//! relaunches the new build from scratch.

use super::Timings;
use crate::capabilities::Drivers;
use crate::config_store::ConfigStore;
use crate::state::{Flag, SharedState};
use ark_common::notify::{COMPLETE_MESSAGE, DOWNLOAD_MESSAGE, INSTALL_MESSAGE};
use ark_common::{Notification, Severity, UpdateEvent, UpdateEventKind};
use chrono::{DateTime, Local};
use std::sync::Arc;
use tokio::time;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Network down or a boot in progress
    Skipped,
    ReadFailed,
    /// No vendor record in the log tail
    NoEvent,
    AlreadySeen,
    /// Recorded as seen, too old to act on
    Stale,
    /// State transition applied
    Applied(UpdateEventKind),
    /// Recognized or not, nothing to do in the current state
    Ignored(UpdateEventKind),
}

pub struct UpdateMonitor {
    state: SharedState,
    config: Arc<ConfigStore>,
    drivers: Drivers,
    timings: Timings,
}

impl UpdateMonitor {
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

    pub async fn tick(&self) -> UpdateOutcome {
        self.tick_at(Local::now()).await
    }

    pub async fn tick_at(&self, now: DateTime<Local>) -> UpdateOutcome {
        if self.state.is_set(Flag::NetworkDown) {
            debug!("Not checking events since internet is down");
            return UpdateOutcome::Skipped;
        }
        if self.state.is_set(Flag::Booting) {
            debug!("Boot in progress, not checking events");
            return UpdateOutcome::Skipped;
        }

        let config = self.config.snapshot();
        let events = match self.drivers.events.poll_recent().await {
            Ok(events) => events,
            Err(e) => {
                warn!("Failed to read system log: {:#}", e);
                return UpdateOutcome::ReadFailed;
            }
        };

        let marker = config.process.update_marker.as_str();
        let Some(event) = events.into_iter().find(|e| e.text.contains(marker)) else {
            debug!("No update events found");
            return UpdateOutcome::NoEvent;
        };

        if self
            .state
            .last_update_event()
            .is_some_and(|seen| seen.is_same(&event))
        {
            return UpdateOutcome::AlreadySeen;
        }

        if now - event.timestamp > self.timings.event_staleness {
            info!(
                "Found {} event but it happened at {}, ignoring",
                event.kind().as_str(),
                event.timestamp.format("%Y-%m-%d %H:%M")
            );
            self.state.mark_update_seen(&event);
            return UpdateOutcome::Stale;
        }

        let outcome = self.apply(&event).await;
        self.state.mark_update_seen(&event);
        outcome
    }

    async fn apply(&self, event: &UpdateEvent) -> UpdateOutcome {
        let kind = event.kind();
        let footer = format!("File: {}", event.text);

        match kind {
            UpdateEventKind::DownloadStarted if !self.state.is_set(Flag::Downloading) => {
                warn!("Download detected: {}", event.text);
                self.state.set(Flag::Downloading, true);
                self.drivers
                    .notifier
                    .notify(
                        Notification::new("Download Detected!", DOWNLOAD_MESSAGE, Severity::Update)
                            .with_footer(footer),
                    )
                    .await;
                UpdateOutcome::Applied(kind)
            }
            UpdateEventKind::InstallStarted if !self.state.is_set(Flag::Installing) => {
                warn!("Install detected: {}", event.text);
                self.state.set(Flag::Installing, true);
                self.state.set(Flag::Downloading, false);
                self.drivers
                    .notifier
                    .notify(
                        Notification::new("Installing", INSTALL_MESSAGE, Severity::Update)
                            .with_footer(footer),
                    )
                    .await;
                UpdateOutcome::Applied(kind)
            }
            UpdateEventKind::InstallComplete
                if self
                    .state
                    .first_set(&[Flag::Downloading, Flag::Installing])
                    .is_some() =>
            {
                warn!("Update success: {}", event.text);
                self.drivers
                    .notifier
                    .notify(
                        Notification::new("Update Complete", COMPLETE_MESSAGE, Severity::Success)
                            .with_footer(footer),
                    )
                    .await;
                time::sleep(self.timings.update_grace).await;

                let server = self.config.snapshot().process.server_process.clone();
                if !self.drivers.process.kill(&server).await {
                    debug!("{} was not running after the update", server);
                }
                self.state.set(Flag::Downloading, false);
                self.state.set(Flag::Installing, false);
                warn!("Update finished, server will be relaunched");
                UpdateOutcome::Applied(kind)
            }
            _ => {
                warn!("No action for '{}' with ID {}", event.text, event.event_id);
                UpdateOutcome::Ignored(kind)
            }
        }
    }
}
