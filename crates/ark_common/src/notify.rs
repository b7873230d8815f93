//! Notification model shared by the supervisor tasks and the webhook sender.

use serde::{Deserialize, Serialize};

pub const DOWNLOAD_MESSAGE: &str =
    "**The server has started downloading an update, and will go down once it starts installing.**";
pub const INSTALL_MESSAGE: &str = "**The server has started installing the update. Stand by...**";
pub const COMPLETE_MESSAGE: &str = "**The server has finished installing the update.**";

/// Notification urgency level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Success,
    /// Vendor update lifecycle
    Update,
    Warning,
    Critical,
}

impl Severity {
    /// Discord embed color
    pub fn color(&self) -> u32 {
        match self {
            Self::Info => 19357,
            Self::Success => 65314,
            Self::Update => 14177041,
            Self::Warning => 16739584,
            Self::Critical => 16711680,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub severity: Severity,
    pub footer: Option<String>,
}

impl Notification {
    pub fn new(title: impl Into<String>, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            severity,
            footer: None,
        }
    }

    pub fn with_footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = Some(footer.into());
        self
    }
}
