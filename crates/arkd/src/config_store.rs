//! Hot reload for the supervisor configuration.
//!
//! The current snapshot lives in a `watch` channel: readers clone the `Arc`,
//! a reload replaces it in one step, and listeners (log level, RCON
//! credentials) wake on every accepted change. A file that fails to parse
//! or validate never reaches the channel.

use anyhow::{Context, Result};
use ark_common::{Config, ConfigError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info};

pub struct ConfigStore {
    /// `None` for stores built from an in-memory config
    path: Option<PathBuf>,
    current: watch::Sender<Arc<Config>>,
    /// mtime of the last file we attempted to load, accepted or not
    mtime: Mutex<Option<SystemTime>>,
}

impl ConfigStore {
    /// Load the initial config. Errors here are fatal to startup.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = Config::load(path)?;
        let mtime = file_mtime(path);
        info!("Loaded config from {}", path.display());

        let (current, _) = watch::channel(Arc::new(config));
        Ok(Self {
            path: Some(path.to_path_buf()),
            current,
            mtime: Mutex::new(mtime),
        })
    }

    /// Store that never reloads
    pub fn fixed(config: Config) -> Self {
        let (current, _) = watch::channel(Arc::new(config));
        Self {
            path: None,
            current,
            mtime: Mutex::new(None),
        }
    }

    /// Current config snapshot
    pub fn snapshot(&self) -> Arc<Config> {
        self.current.borrow().clone()
    }

    /// Receiver that wakes on every accepted reload
    pub fn subscribe(&self) -> watch::Receiver<Arc<Config>> {
        self.current.subscribe()
    }

    /// Re-read the file if its mtime changed.
    ///
    /// Returns Ok(true) if a new config was swapped in, Ok(false) if the file
    /// is unchanged, Err if the new file was rejected (the previous snapshot
    /// stays in place).
    pub async fn reload_if_changed(&self) -> Result<bool> {
        let Some(path) = self.path.as_deref() else {
            return Ok(false);
        };

        let mut last_mtime = self.mtime.lock().await;
        let mtime = tokio::fs::metadata(path)
            .await
            .and_then(|m| m.modified())
            .with_context(|| format!("Failed to stat {}", path.display()))?;

        if *last_mtime == Some(mtime) {
            return Ok(false);
        }
        // Remember the attempt so a broken file is reported once per edit
        *last_mtime = Some(mtime);

        debug!("Config changed on disk, reloading {}", path.display());
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let new_config = match Config::from_toml_str(&text) {
            Ok(config) => config,
            Err(e) => {
                error!("Rejected config reload, keeping previous settings: {}", e);
                return Err(e).context("Config validation failed");
            }
        };

        if **self.current.borrow() == new_config {
            debug!("Config contents unchanged");
            return Ok(false);
        }

        let previous = self.current.send_replace(Arc::new(new_config));
        let current = self.snapshot();
        if previous.settings.debug != current.settings.debug {
            info!("Debug has been changed to {}", current.settings.debug);
        }
        info!("Config reloaded");
        Ok(true)
    }
}

fn file_mtime(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}
