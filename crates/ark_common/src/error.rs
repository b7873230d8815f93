//! Error types for ArkHandler configuration.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid wipe time '{value}': expected MM/DD HH:MM")]
    InvalidWipeTime { value: String },

    #[error("Invalid webhook_url: {0}")]
    InvalidWebhook(String),
}
