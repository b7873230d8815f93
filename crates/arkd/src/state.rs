//! Supervisor state management.
//!
//! One instance per process, shared by every task. The flags double as the
//! locking protocol: `Booting`, `CheckingUpdates` and `Probing` are taken
//! with `try_claim`, which is a single compare-and-swap, and released when
//! the returned `Claim` is dropped.

use ark_common::{SeenUpdateEvent, UpdateEvent};
use chrono::{DateTime, Local};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Lifecycle flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    /// Boot or wipe sequence in progress; exclusive
    Booting,
    /// Server process is up and loaded
    Running,
    /// Store update check in progress; exclusive
    CheckingUpdates,
    Downloading,
    Installing,
    NetworkDown,
    /// Internet guard probe in flight; exclusive
    Probing,
}

impl Flag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Booting => "booting",
            Self::Running => "running",
            Self::CheckingUpdates => "checking_updates",
            Self::Downloading => "downloading",
            Self::Installing => "installing",
            Self::NetworkDown => "network_down",
            Self::Probing => "probing",
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared supervisor state
pub struct SupervisorState {
    booting: AtomicBool,
    running: AtomicBool,
    checking_updates: AtomicBool,
    downloading: AtomicBool,
    installing: AtomicBool,
    network_down: AtomicBool,
    probing: AtomicBool,
    last_update_event: Mutex<Option<SeenUpdateEvent>>,
    last_online_at: Mutex<DateTime<Local>>,
}

impl SupervisorState {
    pub fn new() -> Self {
        Self::starting_at(Local::now())
    }

    /// Fresh state whose connectivity clock starts at `now`
    pub fn starting_at(now: DateTime<Local>) -> Self {
        Self {
            booting: AtomicBool::new(false),
            running: AtomicBool::new(false),
            checking_updates: AtomicBool::new(false),
            downloading: AtomicBool::new(false),
            installing: AtomicBool::new(false),
            network_down: AtomicBool::new(false),
            probing: AtomicBool::new(false),
            last_update_event: Mutex::new(None),
            last_online_at: Mutex::new(now),
        }
    }

    fn cell(&self, flag: Flag) -> &AtomicBool {
        match flag {
            Flag::Booting => &self.booting,
            Flag::Running => &self.running,
            Flag::CheckingUpdates => &self.checking_updates,
            Flag::Downloading => &self.downloading,
            Flag::Installing => &self.installing,
            Flag::NetworkDown => &self.network_down,
            Flag::Probing => &self.probing,
        }
    }

    pub fn is_set(&self, flag: Flag) -> bool {
        self.cell(flag).load(Ordering::SeqCst)
    }

    /// Set a flag, returning its previous value
    pub fn set(&self, flag: Flag, value: bool) -> bool {
        self.cell(flag).swap(value, Ordering::SeqCst)
    }

    /// First flag in `flags` that is currently set
    pub fn first_set(&self, flags: &[Flag]) -> Option<Flag> {
        flags.iter().copied().find(|f| self.is_set(*f))
    }

    /// Atomically take an exclusive flag. `None` if another task holds it.
    pub fn try_claim(&self, flag: Flag) -> Option<Claim<'_>> {
        self.cell(flag)
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| {
                debug!("Claimed {}", flag);
                Claim { state: self, flag }
            })
    }

    pub fn last_update_event(&self) -> Option<SeenUpdateEvent> {
        lock(&self.last_update_event).clone()
    }

    /// Record an event as processed
    pub fn mark_update_seen(&self, event: &UpdateEvent) {
        *lock(&self.last_update_event) = Some(event.seen());
    }

    pub fn last_online_at(&self) -> DateTime<Local> {
        *lock(&self.last_online_at)
    }

    /// Advance the last-online timestamp; never moves it backwards
    pub fn mark_online(&self, at: DateTime<Local>) {
        let mut last = lock(&self.last_online_at);
        if at > *last {
            *last = at;
        }
    }
}

impl Default for SupervisorState {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Exclusive hold on a flag; releasing happens on drop, so every exit path
/// of the holder (return, `?`, panic) gives it back.
pub struct Claim<'a> {
    state: &'a SupervisorState,
    flag: Flag,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        self.state.cell(self.flag).store(false, Ordering::SeqCst);
        debug!("Released {}", self.flag);
    }
}

/// Thread-safe shared state handle
pub type SharedState = Arc<SupervisorState>;

pub fn create_shared_state() -> SharedState {
    Arc::new(SupervisorState::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_claim_is_exclusive() {
        let state = SupervisorState::new();

        let claim = state.try_claim(Flag::Booting);
        assert!(claim.is_some());
        assert!(state.is_set(Flag::Booting));
        assert!(state.try_claim(Flag::Booting).is_none());

        drop(claim);
        assert!(!state.is_set(Flag::Booting));
        assert!(state.try_claim(Flag::Booting).is_some());
    }

    #[test]
    fn test_claim_released_on_early_return() {
        fn sequence(state: &SupervisorState) -> Result<(), String> {
            let _claim = state.try_claim(Flag::Booting).ok_or("busy")?;
            Err("boot driver exploded".to_string())
        }

        let state = SupervisorState::new();
        assert!(sequence(&state).is_err());
        assert!(!state.is_set(Flag::Booting));
    }

    #[test]
    fn test_claims_are_independent() {
        let state = SupervisorState::new();
        let _boot = state.try_claim(Flag::Booting).unwrap();
        let probe = state.try_claim(Flag::Probing);
        assert!(probe.is_some());
    }

    #[test]
    fn test_last_online_is_monotonic() {
        let start = Local::now();
        let state = SupervisorState::starting_at(start);

        state.mark_online(start + Duration::minutes(5));
        state.mark_online(start + Duration::minutes(1));
        assert_eq!(state.last_online_at(), start + Duration::minutes(5));
    }

    #[test]
    fn test_first_set() {
        let state = SupervisorState::new();
        assert_eq!(state.first_set(&[Flag::Downloading, Flag::Installing]), None);
        state.set(Flag::Installing, true);
        assert_eq!(
            state.first_set(&[Flag::Downloading, Flag::Installing]),
            Some(Flag::Installing)
        );
    }
}
