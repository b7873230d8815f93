//! Supervisor task set.
//!
//! Five periodic tasks share one `SupervisorState`:
//! - watchdog: relaunches the server when it is down or stuck loading
//! - update_monitor: follows vendor update events in the system log
//! - wipe: runs scheduled map wipes
//! - internet: stops the server after a long outage
//! - update_check: pokes the store to look for updates
//!
//! Each task runs in its own loop and never overlaps itself. A tick runs in
//! a child task so that a panic is contained, logged and followed by the
//! error cooldown instead of silently ending the loop.

pub mod internet;
pub mod update_check;
pub mod update_monitor;
pub mod watchdog;
pub mod wipe;

pub use internet::{GuardOutcome, InternetGuard};
pub use update_check::{UpdateCheckOutcome, UpdateChecker};
pub use update_monitor::{UpdateMonitor, UpdateOutcome};
pub use watchdog::{Watchdog, WatchdogOutcome};
pub use wipe::{WipeOutcome, WipeScheduler};

use crate::capabilities::Drivers;
use crate::config_store::ConfigStore;
use crate::state::SharedState;
use ark_common::config::IntervalsConfig;
use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Fixed delays and bounds used inside the task bodies
#[derive(Debug, Clone)]
pub struct Timings {
    /// Pause after the boot driver reports failure
    pub boot_failure_backoff: Duration,
    /// Wait between a successful boot and the license service stop
    pub boot_settle: Duration,
    /// Upper bound on waiting for the loaded signal
    pub load_timeout: Duration,
    pub load_poll: Duration,
    /// Pause after an unexpected fault
    pub error_cooldown: Duration,
    /// Wait between "update complete" and killing the server
    pub update_grace: Duration,
    /// Update events older than this are recorded but not acted on
    pub event_staleness: chrono::Duration,
    pub wipe_kill_settle: Duration,
    pub wipe_settle: Duration,
    /// Wait after connectivity returns before clearing the outage
    pub recovery_cooldown: Duration,
    pub store_settle: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            boot_failure_backoff: Duration::from_secs(60),
            boot_settle: Duration::from_secs(10),
            load_timeout: Duration::from_secs(15 * 60),
            load_poll: Duration::from_secs(5),
            error_cooldown: Duration::from_secs(10 * 60),
            update_grace: Duration::from_secs(60),
            event_staleness: chrono::Duration::hours(1),
            wipe_kill_settle: Duration::from_secs(10),
            wipe_settle: Duration::from_secs(65),
            recovery_cooldown: Duration::from_secs(120),
            store_settle: Duration::from_secs(5),
        }
    }
}

/// Owns the tasks and their schedules
pub struct Supervisor {
    state: SharedState,
    config: Arc<ConfigStore>,
    drivers: Drivers,
    timings: Timings,
}

impl Supervisor {
    pub fn new(state: SharedState, config: Arc<ConfigStore>, drivers: Drivers) -> Self {
        Self::with_timings(state, config, drivers, Timings::default())
    }

    pub fn with_timings(
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

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    /// Spawn every task loop. Aborting the handles stops the supervisor.
    pub fn start(&self) -> Vec<JoinHandle<()>> {
        let intervals: IntervalsConfig = self.config.snapshot().intervals.clone();
        let cooldown = self.timings.error_cooldown;
        let mut handles = Vec::new();

        let watchdog = Arc::new(Watchdog::new(
            self.state.clone(),
            self.config.clone(),
            self.drivers.clone(),
            self.timings.clone(),
        ));
        handles.push(spawn_periodic(
            "watchdog",
            secs(intervals.watchdog_delay_secs),
            secs(intervals.watchdog_secs),
            cooldown,
            move || {
                let task = watchdog.clone();
                async move { task.tick().await }
            },
        ));

        let monitor = Arc::new(UpdateMonitor::new(
            self.state.clone(),
            self.config.clone(),
            self.drivers.clone(),
            self.timings.clone(),
        ));
        handles.push(spawn_periodic(
            "update_monitor",
            secs(intervals.events_delay_secs),
            secs(intervals.events_secs),
            cooldown,
            move || {
                let task = monitor.clone();
                async move { task.tick().await }
            },
        ));

        let wipe = Arc::new(WipeScheduler::new(
            self.state.clone(),
            self.config.clone(),
            self.drivers.clone(),
            self.timings.clone(),
        ));
        handles.push(spawn_periodic(
            "wipe",
            secs(intervals.wipe_delay_secs),
            secs(intervals.wipe_secs),
            cooldown,
            move || {
                let task = wipe.clone();
                async move { task.tick().await }
            },
        ));

        let guard = Arc::new(InternetGuard::new(
            self.state.clone(),
            self.config.clone(),
            self.drivers.clone(),
            self.timings.clone(),
        ));
        handles.push(spawn_periodic(
            "internet",
            secs(intervals.internet_delay_secs),
            secs(intervals.internet_secs),
            cooldown,
            move || {
                let task = guard.clone();
                async move { task.tick().await }
            },
        ));

        let checker = Arc::new(UpdateChecker::new(
            self.state.clone(),
            self.config.clone(),
            self.drivers.clone(),
            self.timings.clone(),
        ));
        handles.push(spawn_periodic(
            "update_check",
            secs(intervals.update_check_delay_secs),
            secs(intervals.update_check_secs),
            cooldown,
            move || {
                let task = checker.clone();
                async move { task.tick().await }
            },
        ));

        let config = self.config.clone();
        let reload_every = secs(intervals.config_reload_secs);
        handles.push(spawn_periodic(
            "config_reload",
            reload_every,
            reload_every,
            cooldown,
            move || {
                let store = config.clone();
                async move {
                    // Rejections are logged by the store
                    store.reload_if_changed().await.unwrap_or(false)
                }
            },
        ));

        info!("Supervisor started {} tasks", handles.len());
        handles
    }
}

fn secs(value: u64) -> Duration {
    Duration::from_secs(value.max(1))
}

/// Run `tick` after `delay`, then every `period`.
///
/// The next tick starts only after the previous one returned, so a task
/// never overlaps itself even when a tick outlasts its period.
pub fn spawn_periodic<F, Fut, T>(
    name: &'static str,
    delay: Duration,
    period: Duration,
    panic_cooldown: Duration,
    tick: F,
) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = T> + Send + 'static,
    T: Debug + Send + 'static,
{
    tokio::spawn(async move {
        debug!("Task {} starts in {:?}, every {:?}", name, delay, period);
        let mut interval = time::interval_at(time::Instant::now() + delay, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            match tokio::spawn(tick()).await {
                Ok(outcome) => debug!("Task {} finished: {:?}", name, outcome),
                Err(e) if e.is_panic() => {
                    error!("Task {} panicked: {}", name, e);
                    warn!("Sleeping {:?} before running {} again", panic_cooldown, name);
                    time::sleep(panic_cooldown).await;
                }
                Err(e) => {
                    warn!("Task {} was cancelled: {}", name, e);
                    return;
                }
            }
        }
    })
}
