//! Tracing setup with a runtime-adjustable level.
//!
//! `RUST_LOG` wins when set; otherwise the level follows the `debug`
//! setting and is swapped in place when the config is reloaded.

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter, Registry};

const DEFAULT_DIRECTIVE: &str = "info";
const DEBUG_DIRECTIVE: &str = "info,arkd=debug,ark_common=debug";

pub struct LogLevelHandle {
    handle: reload::Handle<EnvFilter, Registry>,
    from_env: bool,
}

fn directive(enabled: bool) -> &'static str {
    if enabled {
        DEBUG_DIRECTIVE
    } else {
        DEFAULT_DIRECTIVE
    }
}

/// Install the global subscriber
pub fn init(enabled: bool) -> Result<LogLevelHandle> {
    let from_env = std::env::var_os(EnvFilter::DEFAULT_ENV).is_some();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(directive(enabled)));

    let (layer, handle) = reload::Layer::new(filter);
    tracing_subscriber::registry()
        .with(layer)
        .with(fmt::layer().with_target(false))
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(LogLevelHandle { handle, from_env })
}

impl LogLevelHandle {
    pub fn set_debug(&self, enabled: bool) {
        if self.from_env {
            return;
        }
        let level = if enabled { "debug" } else { "info" };
        match self.handle.reload(EnvFilter::new(directive(enabled))) {
            Ok(()) => info!("Log level set to {}", level),
            Err(e) => eprintln!("Failed to change log level: {}", e),
        }
    }
}
