//! Configuration model for arkd.
//!
//! Loaded from `config.toml` next to the executable. Every field has a
//! default so a partial file is valid; `Config::validate` normalizes ini
//! paths and rejects anything the supervisor could not act on.

use crate::error::ConfigError;
use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Config file name, resolved next to the executable
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Vendor package name of the supervised application
pub const APP_PACKAGE: &str = "StudioWildcard.4558480580BB9_1w2mm55455e38";

const WEBHOOK_PREFIX: &str = "https://discord.com/api/webhooks/";

/// Written out when no config file exists yet
pub const DEFAULT_CONFIG_TEXT: &str = r#"# ArkHandler configuration

[settings]
# Discord webhook for status notifications (leave empty to disable)
webhook_url = ""
# Backup copies synced into the live config dir before every boot
game_ini = ""
game_user_settings_ini = ""
# Wipe the map data at the listed times (MM/DD HH:MM, local time, every year)
auto_wipe = false
cluster_wipe = false
wipe_times = []
# Stop the server after this many minutes without internet (0 disables)
outage_kill_minutes = 0
auto_update = true
debug = false
"#;

/// Top level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,

    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub process: ProcessConfig,

    #[serde(default)]
    pub intervals: IntervalsConfig,
}

/// User facing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Discord webhook target
    #[serde(default)]
    pub webhook_url: String,

    /// Backup Game.ini (file or directory)
    #[serde(default)]
    pub game_ini: Option<PathBuf>,

    /// Backup GameUserSettings.ini (file or directory)
    #[serde(default)]
    pub game_user_settings_ini: Option<PathBuf>,

    #[serde(default)]
    pub auto_wipe: bool,

    /// Also delete shared cluster data when wiping
    #[serde(default)]
    pub cluster_wipe: bool,

    #[serde(default)]
    pub wipe_times: Vec<WipeTime>,

    /// Minutes without internet before the server is stopped; 0 disables
    #[serde(default)]
    pub outage_kill_minutes: u64,

    #[serde(default = "default_true")]
    pub auto_update: bool,

    #[serde(default)]
    pub debug: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            webhook_url: String::new(),
            game_ini: None,
            game_user_settings_ini: None,
            auto_wipe: false,
            cluster_wipe: false,
            wipe_times: Vec::new(),
            outage_kill_minutes: 0,
            auto_update: true,
            debug: false,
        }
    }
}

/// Filesystem locations of the supervised application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// The application's `Saved` directory
    #[serde(default = "default_saved_dir")]
    pub saved_dir: PathBuf,
}

fn default_saved_dir() -> PathBuf {
    let local = std::env::var("LOCALAPPDATA").unwrap_or_default();
    PathBuf::from(local)
        .join("Packages")
        .join(APP_PACKAGE)
        .join("LocalState")
        .join("Saved")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            saved_dir: default_saved_dir(),
        }
    }
}

impl PathsConfig {
    /// Live config directory the ini files are synced into
    pub fn ini_dir(&self) -> PathBuf {
        self.saved_dir.join("UWPConfig").join("UWP")
    }

    pub fn maps_dir(&self) -> PathBuf {
        self.saved_dir.join("Maps")
    }

    pub fn cluster_dir(&self) -> PathBuf {
        self.saved_dir.join("clusters").join("solecluster")
    }

    /// Live GameUserSettings.ini, which also holds the RCON credentials
    pub fn live_game_user_settings(&self) -> PathBuf {
        self.ini_dir().join(GAME_USER_SETTINGS_INI)
    }
}

pub const GAME_INI: &str = "Game.ini";
pub const GAME_USER_SETTINGS_INI: &str = "GameUserSettings.ini";

/// Process and external command names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessConfig {
    #[serde(default = "default_server_process")]
    pub server_process: String,

    /// Store helper that gets stuck open during updates
    #[serde(default = "default_store_process")]
    pub store_process: String,

    #[serde(default = "default_license_service")]
    pub license_service: String,

    /// Substring identifying vendor update events in the system log
    #[serde(default = "default_update_marker")]
    pub update_marker: String,

    /// Launches the server and navigates its menus; exit code 0 means booted
    #[serde(default)]
    pub boot_command: Vec<String>,

    /// Exit code 0 means the server has finished loading
    #[serde(default)]
    pub loaded_command: Vec<String>,

    /// Asks the store to look for updates; exit code 0 means an update is pending
    #[serde(default)]
    pub update_check_command: Vec<String>,

    #[serde(default = "default_rcon_host")]
    pub rcon_host: String,
}

fn default_server_process() -> String {
    "ShooterGame.exe".to_string()
}

fn default_store_process() -> String {
    "WinStore.App.exe".to_string()
}

fn default_license_service() -> String {
    "LicenseManager".to_string()
}

fn default_update_marker() -> String {
    "-StudioWildcard".to_string()
}

fn default_rcon_host() -> String {
    "127.0.0.1".to_string()
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            server_process: default_server_process(),
            store_process: default_store_process(),
            license_service: default_license_service(),
            update_marker: default_update_marker(),
            boot_command: Vec::new(),
            loaded_command: Vec::new(),
            update_check_command: Vec::new(),
            rcon_host: default_rcon_host(),
        }
    }
}

/// Task intervals and startup delays, in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalsConfig {
    #[serde(default = "default_watchdog_secs")]
    pub watchdog_secs: u64,
    #[serde(default = "default_watchdog_delay")]
    pub watchdog_delay_secs: u64,

    #[serde(default = "default_events_secs")]
    pub events_secs: u64,
    #[serde(default = "default_events_delay")]
    pub events_delay_secs: u64,

    #[serde(default = "default_wipe_secs")]
    pub wipe_secs: u64,
    #[serde(default = "default_late_delay")]
    pub wipe_delay_secs: u64,

    #[serde(default = "default_internet_secs")]
    pub internet_secs: u64,
    #[serde(default = "default_late_delay")]
    pub internet_delay_secs: u64,

    #[serde(default = "default_update_check_secs")]
    pub update_check_secs: u64,
    #[serde(default = "default_update_check_secs")]
    pub update_check_delay_secs: u64,

    #[serde(default = "default_config_reload_secs")]
    pub config_reload_secs: u64,
}

fn default_watchdog_secs() -> u64 {
    30
}

fn default_watchdog_delay() -> u64 {
    10
}

fn default_events_secs() -> u64 {
    15
}

fn default_events_delay() -> u64 {
    120
}

fn default_wipe_secs() -> u64 {
    15
}

fn default_late_delay() -> u64 {
    300
}

fn default_internet_secs() -> u64 {
    30
}

fn default_update_check_secs() -> u64 {
    600
}

fn default_config_reload_secs() -> u64 {
    60
}

impl Default for IntervalsConfig {
    fn default() -> Self {
        Self {
            watchdog_secs: default_watchdog_secs(),
            watchdog_delay_secs: default_watchdog_delay(),
            events_secs: default_events_secs(),
            events_delay_secs: default_events_delay(),
            wipe_secs: default_wipe_secs(),
            wipe_delay_secs: default_late_delay(),
            internet_secs: default_internet_secs(),
            internet_delay_secs: default_late_delay(),
            update_check_secs: default_update_check_secs(),
            update_check_delay_secs: default_update_check_secs(),
            config_reload_secs: default_config_reload_secs(),
        }
    }
}

impl Config {
    /// Parse and validate a config from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text)?;
        config.validate()
    }

    /// Read, parse and validate a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Validate and normalize. Consumes self so a failed validation never
    /// leaves a half-checked config around.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        let webhook = self.settings.webhook_url.replace('"', "");
        let webhook = webhook.trim().to_string();
        if !webhook.is_empty() && !webhook.starts_with(WEBHOOK_PREFIX) {
            return Err(ConfigError::InvalidWebhook(webhook));
        }
        self.settings.webhook_url = webhook;

        self.settings.game_ini = normalize_ini(self.settings.game_ini.take(), GAME_INI);
        self.settings.game_user_settings_ini = normalize_ini(
            self.settings.game_user_settings_ini.take(),
            GAME_USER_SETTINGS_INI,
        );

        Ok(self)
    }

    /// Ini backup sources that should be synced before a boot
    pub fn sync_sources(&self) -> Vec<PathBuf> {
        [&self.settings.game_ini, &self.settings.game_user_settings_ini]
            .into_iter()
            .flatten()
            .cloned()
            .collect()
    }

    /// True if any configured wipe time matches `now` to the minute
    pub fn wipe_due(&self, now: &NaiveDateTime) -> bool {
        self.settings.wipe_times.iter().any(|t| t.matches(now))
    }
}

/// An empty path means "not configured"; a directory gets the canonical
/// file name appended. Existence is checked when syncing, not here, so a
/// backup that is briefly unavailable never blocks an unrelated edit.
fn normalize_ini(path: Option<PathBuf>, name: &str) -> Option<PathBuf> {
    let path = path.filter(|p| !p.as_os_str().is_empty())?;
    if path.is_dir() {
        Some(path.join(name))
    } else {
        Some(path)
    }
}

/// Recurring wipe timestamp, matched every year
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WipeTime {
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
}

impl WipeTime {
    pub fn matches(&self, now: &NaiveDateTime) -> bool {
        self.month == now.month()
            && self.day == now.day()
            && self.hour == now.hour()
            && self.minute == now.minute()
    }
}

impl FromStr for WipeTime {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim().trim_matches('"');
        // Leap year so that 02/29 is accepted
        let parsed = NaiveDateTime::parse_from_str(&format!("2000/{value}"), "%Y/%m/%d %H:%M")
            .map_err(|_| ConfigError::InvalidWipeTime {
                value: s.to_string(),
            })?;
        Ok(Self {
            month: parsed.month(),
            day: parsed.day(),
            hour: parsed.hour(),
            minute: parsed.minute(),
        })
    }
}

impl fmt::Display for WipeTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}/{:02} {:02}:{:02}",
            self.month, self.day, self.hour, self.minute
        )
    }
}

impl Serialize for WipeTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for WipeTime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
