//! System log reader.
//!
//! Reads the newest records of the Windows System log through PowerShell and
//! maps them to `UpdateEvent`s, most recent first.

use crate::capabilities::EventSource;
use anyhow::{bail, Context, Result};
use ark_common::UpdateEvent;
use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::Deserialize;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time;

const DEFAULT_MAX_EVENTS: u32 = 50;
const READ_TIMEOUT: Duration = Duration::from_secs(30);

pub struct PowerShellEventSource {
    max_events: u32,
}

impl PowerShellEventSource {
    pub fn new() -> Self {
        Self {
            max_events: DEFAULT_MAX_EVENTS,
        }
    }

    fn script(&self) -> String {
        format!(
            "$ErrorActionPreference = 'Stop'; \
             $records = Get-WinEvent -LogName System -MaxEvents {} | ForEach-Object {{ \
               [pscustomobject]@{{ \
                 Id = $_.Id; \
                 RecordId = $_.RecordId; \
                 TimeCreated = $_.TimeCreated.ToString('o'); \
                 Text = if ($_.Properties.Count -gt 0) {{ [string]$_.Properties[0].Value }} else {{ '' }} \
               }} }}; \
             ConvertTo-Json -InputObject @($records) -Compress",
            self.max_events
        )
    }
}

impl Default for PowerShellEventSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventSource for PowerShellEventSource {
    async fn poll_recent(&self) -> Result<Vec<UpdateEvent>> {
        let script = self.script();
        let output = Command::new("powershell")
            .args(["-NoProfile", "-NonInteractive", "-Command", script.as_str()])
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();
        let output = time::timeout(READ_TIMEOUT, output)
            .await
            .context("Timed out reading the system log")?
            .context("Failed to run powershell")?;

        if !output.status.success() {
            bail!(
                "Get-WinEvent failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        parse_events(&String::from_utf8_lossy(&output.stdout))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawEvent {
    id: u32,
    record_id: Option<u64>,
    time_created: String,
    #[serde(default)]
    text: Option<String>,
}

/// ConvertTo-Json collapses a single element array on older PowerShell
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<RawEvent>),
    One(RawEvent),
}

/// Parse the JSON written by the reader script
pub fn parse_events(json: &str) -> Result<Vec<UpdateEvent>> {
    let json = json.trim();
    if json.is_empty() {
        return Ok(Vec::new());
    }

    let raw = match serde_json::from_str::<OneOrMany>(json).context("Invalid event JSON")? {
        OneOrMany::Many(events) => events,
        OneOrMany::One(event) => vec![event],
    };

    raw.into_iter()
        .map(|event| {
            let timestamp = DateTime::parse_from_rfc3339(&event.time_created)
                .with_context(|| format!("Invalid event time '{}'", event.time_created))?
                .with_timezone(&Local);
            let identity = event
                .record_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| event.time_created.clone());
            Ok(UpdateEvent {
                event_id: event.id,
                identity,
                timestamp,
                text: event.text.unwrap_or_default(),
            })
        })
        .collect()
}
