//! In-memory fakes for every capability, plus a harness that wires them
//! into the supervisor tasks.

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use ark_common::{Config, Notification, UpdateEvent, WipeTime};
use arkd::capabilities::{
    BootDriver, ConnectivityProbe, Drivers, EventSource, FileSync, LivenessProbe, Notifier,
    ProcessControl, RemoteConsole, UpdateTrigger, WipeRoutine,
};
use arkd::state::SupervisorState;
use arkd::supervisor::{InternetGuard, UpdateChecker, UpdateMonitor, Watchdog, WipeScheduler};
use arkd::{ConfigStore, SharedState, Timings};
use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

pub const SERVER: &str = "ShooterGame.exe";
pub const STORE: &str = "WinStore.App.exe";
pub const MARKER_TEXT: &str = "9PDKWCR5M7J1-StudioWildcard";

// ============================================================================
// Server process
// ============================================================================

/// Server process plus process table
pub struct FakeServer {
    pub running: AtomicBool,
    /// Whether a running server reports loaded
    pub loads: AtomicBool,
    kills: Mutex<Vec<String>>,
    services: Mutex<Vec<String>>,
}

impl FakeServer {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            loads: AtomicBool::new(true),
            kills: Mutex::new(Vec::new()),
            services: Mutex::new(Vec::new()),
        }
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }

    pub fn is_up(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Kill attempts against `name`
    pub fn kills_of(&self, name: &str) -> usize {
        self.kills.lock().unwrap().iter().filter(|n| *n == name).count()
    }

    pub fn stopped_services(&self) -> Vec<String> {
        self.services.lock().unwrap().clone()
    }
}

#[async_trait]
impl LivenessProbe for FakeServer {
    async fn is_running(&self) -> bool {
        self.is_up()
    }

    async fn is_loaded(&self) -> bool {
        self.is_up() && self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProcessControl for FakeServer {
    async fn kill(&self, name: &str) -> bool {
        self.kills.lock().unwrap().push(name.to_string());
        name == SERVER && self.running.swap(false, Ordering::SeqCst)
    }

    async fn get_pid(&self, name: &str) -> Option<u32> {
        (name == SERVER && self.is_up()).then_some(4242)
    }

    async fn stop_service(&self, name: &str) {
        self.services.lock().unwrap().push(name.to_string());
    }
}

// ============================================================================
// Boot driver
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub enum BootScript {
    Succeed,
    Fail,
    Error,
}

/// Scripted boots; a successful boot starts the fake server
pub struct FakeBoot {
    server: Arc<FakeServer>,
    script: Mutex<VecDeque<BootScript>>,
    calls: AtomicUsize,
    /// When set, every boot waits for a permit before returning
    gate: Option<Arc<Notify>>,
    /// Signalled as soon as a boot starts
    pub entered: Arc<Notify>,
}

impl FakeBoot {
    pub fn new(server: Arc<FakeServer>) -> Self {
        Self {
            server,
            script: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            gate: None,
            entered: Arc::new(Notify::new()),
        }
    }

    pub fn gated(server: Arc<FakeServer>, gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new(server)
        }
    }

    pub fn push(&self, step: BootScript) {
        self.script.lock().unwrap().push_back(step);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BootDriver for FakeBoot {
    async fn boot(&self) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(BootScript::Succeed);
        match step {
            BootScript::Succeed => {
                self.server.set_running(true);
                Ok(true)
            }
            BootScript::Fail => Ok(false),
            BootScript::Error => Err(anyhow!("menu navigation lost the window")),
        }
    }
}

// ============================================================================
// Everything else
// ============================================================================

#[derive(Default)]
pub struct FakeEvents {
    events: Mutex<Vec<UpdateEvent>>,
    pub fail: AtomicBool,
}

impl FakeEvents {
    pub fn set(&self, events: Vec<UpdateEvent>) {
        *self.events.lock().unwrap() = events;
    }
}

#[async_trait]
impl EventSource for FakeEvents {
    async fn poll_recent(&self) -> Result<Vec<UpdateEvent>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("event log unavailable"));
        }
        Ok(self.events.lock().unwrap().clone())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn titles(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|n| n.title.clone())
            .collect()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: Notification) {
        self.sent.lock().unwrap().push(notification);
    }
}

#[derive(Default)]
pub struct FakeConsole {
    commands: Mutex<Vec<String>>,
    pub fail: AtomicBool,
}

impl FakeConsole {
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteConsole for FakeConsole {
    async fn execute(&self, command: &str) -> Result<String> {
        self.commands.lock().unwrap().push(command.to_string());
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("connection refused"));
        }
        Ok("World Saved".to_string())
    }
}

#[derive(Default)]
pub struct FakeFiles {
    synced: Mutex<Vec<PathBuf>>,
}

impl FakeFiles {
    pub fn synced(&self) -> Vec<PathBuf> {
        self.synced.lock().unwrap().clone()
    }
}

#[async_trait]
impl FileSync for FakeFiles {
    async fn sync(&self, source: &Path) -> bool {
        self.synced.lock().unwrap().push(source.to_path_buf());
        true
    }
}

/// Answers from a script; online once the script runs out
#[derive(Default)]
pub struct FakeConnectivity {
    script: Mutex<VecDeque<bool>>,
    calls: AtomicUsize,
}

impl FakeConnectivity {
    pub fn push(&self, online: bool) {
        self.script.lock().unwrap().push_back(online);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConnectivityProbe for FakeConnectivity {
    async fn check(&self) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script.lock().unwrap().pop_front().unwrap_or(true)
    }
}

#[derive(Default)]
pub struct FakeWipe {
    calls: Mutex<Vec<bool>>,
    pub fail: AtomicBool,
}

impl FakeWipe {
    /// `include_cluster` of every wipe so far
    pub fn calls(&self) -> Vec<bool> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl WipeRoutine for FakeWipe {
    async fn wipe(&self, include_cluster: bool) -> Result<usize> {
        self.calls.lock().unwrap().push(include_cluster);
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("access denied"));
        }
        Ok(3)
    }
}

#[derive(Default)]
pub struct FakeUpdates {
    pub pending: AtomicBool,
    calls: AtomicUsize,
    gate: Option<Arc<Notify>>,
}

impl FakeUpdates {
    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UpdateTrigger for FakeUpdates {
    async fn check_for_updates(&self) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        Ok(self.pending.load(Ordering::SeqCst))
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub state: SharedState,
    pub config: Arc<ConfigStore>,
    pub server: Arc<FakeServer>,
    pub boot: Arc<FakeBoot>,
    pub events: Arc<FakeEvents>,
    pub notifier: Arc<RecordingNotifier>,
    pub console: Arc<FakeConsole>,
    pub files: Arc<FakeFiles>,
    pub connectivity: Arc<FakeConnectivity>,
    pub wipe: Arc<FakeWipe>,
    pub updates: Arc<FakeUpdates>,
    pub timings: Timings,
}

impl Harness {
    pub fn new(config: Config) -> Self {
        HarnessBuilder::new(config).build()
    }

    pub fn builder(config: Config) -> HarnessBuilder {
        HarnessBuilder::new(config)
    }

    pub fn drivers(&self) -> Drivers {
        Drivers {
            liveness: self.server.clone(),
            boot: self.boot.clone(),
            events: self.events.clone(),
            notifier: self.notifier.clone(),
            console: self.console.clone(),
            files: self.files.clone(),
            process: self.server.clone(),
            connectivity: self.connectivity.clone(),
            wipe: self.wipe.clone(),
            updates: self.updates.clone(),
        }
    }

    pub fn watchdog(&self) -> Watchdog {
        Watchdog::new(
            self.state.clone(),
            self.config.clone(),
            self.drivers(),
            self.timings.clone(),
        )
    }

    pub fn monitor(&self) -> UpdateMonitor {
        UpdateMonitor::new(
            self.state.clone(),
            self.config.clone(),
            self.drivers(),
            self.timings.clone(),
        )
    }

    pub fn wipe_scheduler(&self) -> WipeScheduler {
        WipeScheduler::new(
            self.state.clone(),
            self.config.clone(),
            self.drivers(),
            self.timings.clone(),
        )
    }

    pub fn guard(&self) -> InternetGuard {
        InternetGuard::new(
            self.state.clone(),
            self.config.clone(),
            self.drivers(),
            self.timings.clone(),
        )
    }

    pub fn checker(&self) -> UpdateChecker {
        UpdateChecker::new(
            self.state.clone(),
            self.config.clone(),
            self.drivers(),
            self.timings.clone(),
        )
    }
}

pub struct HarnessBuilder {
    config: Config,
    started_at: DateTime<Local>,
    boot_gate: Option<Arc<Notify>>,
    update_gate: Option<Arc<Notify>>,
}

impl HarnessBuilder {
    fn new(config: Config) -> Self {
        Self {
            config,
            started_at: Local::now(),
            boot_gate: None,
            update_gate: None,
        }
    }

    /// Connectivity clock start
    pub fn started_at(mut self, at: DateTime<Local>) -> Self {
        self.started_at = at;
        self
    }

    pub fn boot_gate(mut self, gate: Arc<Notify>) -> Self {
        self.boot_gate = Some(gate);
        self
    }

    pub fn update_gate(mut self, gate: Arc<Notify>) -> Self {
        self.update_gate = Some(gate);
        self
    }

    pub fn build(self) -> Harness {
        let server = Arc::new(FakeServer::new());
        let boot = match self.boot_gate {
            Some(gate) => FakeBoot::gated(server.clone(), gate),
            None => FakeBoot::new(server.clone()),
        };
        let updates = match self.update_gate {
            Some(gate) => FakeUpdates::gated(gate),
            None => FakeUpdates::default(),
        };

        Harness {
            state: Arc::new(SupervisorState::starting_at(self.started_at)),
            config: Arc::new(ConfigStore::fixed(self.config)),
            server,
            boot: Arc::new(boot),
            events: Arc::new(FakeEvents::default()),
            notifier: Arc::new(RecordingNotifier::default()),
            console: Arc::new(FakeConsole::default()),
            files: Arc::new(FakeFiles::default()),
            connectivity: Arc::new(FakeConnectivity::default()),
            wipe: Arc::new(FakeWipe::default()),
            updates: Arc::new(updates),
            timings: Timings::default(),
        }
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn base_config() -> Config {
    Config::default()
}

pub fn wipe_config(times: &[&str], cluster: bool) -> Config {
    let mut config = Config::default();
    config.settings.auto_wipe = true;
    config.settings.cluster_wipe = cluster;
    config.settings.wipe_times = times
        .iter()
        .map(|t| t.parse::<WipeTime>().unwrap())
        .collect();
    config
}

pub fn outage_config(minutes: u64) -> Config {
    let mut config = Config::default();
    config.settings.outage_kill_minutes = minutes;
    config
}

/// Local wall clock time on a fixed day
pub fn local(year: i32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> DateTime<Local> {
    Local
        .with_ymd_and_hms(year, month, day, hour, minute, second)
        .earliest()
        .unwrap()
}

pub fn naive(month: u32, day: u32, hour: u32, minute: u32, second: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, second))
        .unwrap()
}

pub fn update_event(event_id: u32, record: u64, at: DateTime<Local>) -> UpdateEvent {
    UpdateEvent {
        event_id,
        identity: record.to_string(),
        timestamp: at,
        text: MARKER_TEXT.to_string(),
    }
}
