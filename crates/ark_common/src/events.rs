//! Vendor update lifecycle events read from the system log.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Event id written when the store starts downloading an update
pub const EVENT_DOWNLOAD_STARTED: u32 = 44;
/// Event id written when the store starts installing an update
pub const EVENT_INSTALL_STARTED: u32 = 43;
/// Event id written when an install finished
pub const EVENT_INSTALL_COMPLETE: u32 = 19;

/// Interpretation of a log record's event id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateEventKind {
    DownloadStarted,
    InstallStarted,
    InstallComplete,
    Unrecognized(u32),
}

impl UpdateEventKind {
    pub fn from_event_id(id: u32) -> Self {
        match id {
            EVENT_DOWNLOAD_STARTED => Self::DownloadStarted,
            EVENT_INSTALL_STARTED => Self::InstallStarted,
            EVENT_INSTALL_COMPLETE => Self::InstallComplete,
            other => Self::Unrecognized(other),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DownloadStarted => "download started",
            Self::InstallStarted => "install started",
            Self::InstallComplete => "install complete",
            Self::Unrecognized(_) => "unrecognized",
        }
    }
}

/// A single system log record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateEvent {
    pub event_id: u32,
    /// Stable identity of the record (record number, or creation time)
    pub identity: String,
    pub timestamp: DateTime<Local>,
    /// First insertion string, e.g. the package file name
    pub text: String,
}

impl UpdateEvent {
    pub fn kind(&self) -> UpdateEventKind {
        UpdateEventKind::from_event_id(self.event_id)
    }

    /// Marker for de-duplication
    pub fn seen(&self) -> SeenUpdateEvent {
        SeenUpdateEvent {
            kind: self.kind(),
            identity: self.identity.clone(),
            timestamp: self.timestamp,
        }
    }
}

/// The last interpreted update event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeenUpdateEvent {
    pub kind: UpdateEventKind,
    pub identity: String,
    pub timestamp: DateTime<Local>,
}

impl SeenUpdateEvent {
    pub fn is_same(&self, event: &UpdateEvent) -> bool {
        self.identity == event.identity && self.timestamp == event.timestamp
    }
}
