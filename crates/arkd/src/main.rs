//! arkd - game server supervisor daemon

use anyhow::{bail, Context, Result};
use ark_common::config::{CONFIG_FILE_NAME, DEFAULT_CONFIG_TEXT};
use ark_common::Config;
use arkd::{create_shared_state, drivers, logging, ConfigStore, Supervisor};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "arkd")]
#[command(about = "Keeps a dedicated game server running, updated and wiped on schedule", long_about = None)]
#[command(version = ark_common::VERSION)]
struct Cli {
    /// Config file (defaults to config.toml next to the executable)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Validate the config file and exit
    #[arg(long)]
    check_config: bool,
}

fn default_config_path() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("Failed to locate the executable")?;
    let dir = exe
        .parent()
        .context("Executable has no parent directory")?;
    Ok(dir.join(CONFIG_FILE_NAME))
}

fn print_summary(path: &Path, config: &Config) {
    let settings = &config.settings;
    println!("{} is valid", path.display());
    println!("  webhook:        {}", if settings.webhook_url.is_empty() { "disabled" } else { "set" });
    for source in config.sync_sources() {
        println!("  ini sync:       {}", source.display());
    }
    if settings.auto_wipe {
        let times: Vec<String> = settings.wipe_times.iter().map(|t| t.to_string()).collect();
        println!(
            "  auto wipe:      {} (cluster: {})",
            times.join(", "),
            settings.cluster_wipe
        );
    } else {
        println!("  auto wipe:      off");
    }
    match settings.outage_kill_minutes {
        0 => println!("  outage kill:    off"),
        n => println!("  outage kill:    after {} minutes", n),
    }
    println!("  auto update:    {}", settings.auto_update);
    println!("  debug:          {}", settings.debug);
    println!("  saved dir:      {}", config.paths.saved_dir.display());
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = logging::init(false)?;

    let path = match cli.config {
        Some(path) => path,
        None => default_config_path()?,
    };
    if !path.exists() {
        std::fs::write(&path, DEFAULT_CONFIG_TEXT)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        bail!(
            "No config found, wrote a default one to {}. Fill it in and start again.",
            path.display()
        );
    }

    let store = Arc::new(
        ConfigStore::load(&path)
            .with_context(|| format!("Invalid config {}", path.display()))?,
    );
    if cli.check_config {
        print_summary(&path, &store.snapshot());
        return Ok(());
    }

    let config = store.snapshot();
    log_level.set_debug(config.settings.debug);
    info!("arkd v{} starting (PID {})", ark_common::VERSION, std::process::id());
    if config.settings.debug {
        warn!("Debug mode: reboot notifications are muted");
    }

    let (drivers, console) = drivers::build(store.clone())?;
    console.refresh(&config.paths).await;

    let state = create_shared_state();
    let supervisor = Supervisor::new(state, store.clone(), drivers);
    let mut handles = supervisor.start();

    let mut changes = store.subscribe();
    handles.push(tokio::spawn(async move {
        while changes.changed().await.is_ok() {
            let config = changes.borrow_and_update().clone();
            log_level.set_debug(config.settings.debug);
            console.refresh(&config.paths).await;
        }
    }));

    info!("arkd ready");
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }

    info!("Shutting down");
    for handle in &handles {
        handle.abort();
    }
    info!("Goodbye");
    Ok(())
}
