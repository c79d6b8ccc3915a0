//! Capstan Runner
//!
//! A long-running daemon that polls a work catalog, deduplicates job
//! identifiers against a shared tracking file, and drives bounded-parallel
//! external tool runs.
//!
//! Architecture:
//! - Configuration: load settings from environment or defaults
//! - Catalog: read-only SQLite client providing the candidate id set
//! - State: advisory-locked tracking file of already-dispatched jobs
//! - Scheduler: poll loop with bounded dispatch and graceful shutdown

use anyhow::{Context, Result};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use capstan_catalog::SqliteCatalog;
use capstan_runner::config::Config;
use capstan_runner::executor::CommandExecutor;
use capstan_runner::scheduler::Poller;
use capstan_runner::state::FileStateStore;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env();
    config.validate()?;

    init_logging(&config)?;

    info!("Starting Capstan Runner");
    info!(
        "Loaded configuration: catalog={}, tracking_file={}, tool={}",
        config.catalog_db_path.display(),
        config.tracking_file_path.display(),
        config.tool_command
    );

    // The catalog may still be populating when the runner starts (common
    // right after deployment), so probe it with backoff before looping.
    let catalog = open_catalog_with_retry(&config).await?;
    info!("Catalog opened");

    let store = Arc::new(FileStateStore::new(config.tracking_file_path.clone()));
    let executor = Arc::new(CommandExecutor::new(
        config.tool_command.clone(),
        config.tool_args.clone(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    spawn_signal_listener(shutdown_tx);

    let mut poller = Poller::new(config, Arc::new(catalog), store, executor, shutdown_rx);

    info!("Runner initialized successfully");

    if let Err(e) = poller.run().await {
        error!("Poller error: {}", e);
        return Err(e);
    }

    info!("Shutdown complete");
    Ok(())
}

/// Initializes tracing to stderr or the configured log file
fn init_logging(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "capstan_runner=info,capstan_catalog=info".into());

    match &config.log_destination {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(Mutex::new(file))
                        .with_ansi(false),
                )
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    Ok(())
}

/// Opens the catalog with retry and exponential backoff
async fn open_catalog_with_retry(config: &Config) -> Result<SqliteCatalog> {
    const MAX_ATTEMPTS: u32 = 10;
    const INITIAL_DELAY_MS: u64 = 500;
    const MAX_DELAY_MS: u64 = 30_000;

    let mut attempt = 0;
    let mut delay_ms = INITIAL_DELAY_MS;

    loop {
        attempt += 1;

        match probe_catalog(config).await {
            Ok(catalog) => {
                if attempt > 1 {
                    info!("Catalog became available after {} attempt(s)", attempt);
                }
                return Ok(catalog);
            }
            Err(e) => {
                if attempt >= MAX_ATTEMPTS {
                    error!("Catalog unavailable after {} attempts", MAX_ATTEMPTS);
                    return Err(e).context("Failed to open catalog database");
                }

                warn!(
                    "Catalog not available (attempt {}/{}): {}",
                    attempt, MAX_ATTEMPTS, e
                );
                warn!("Retrying in {} ms...", delay_ms);

                tokio::time::sleep(Duration::from_millis(delay_ms)).await;

                // Exponential backoff with cap
                delay_ms = (delay_ms * 2).min(MAX_DELAY_MS);
            }
        }
    }
}

/// Opens the catalog and verifies it answers a query
async fn probe_catalog(config: &Config) -> capstan_catalog::Result<SqliteCatalog> {
    let catalog = SqliteCatalog::open(&config.catalog_db_path).await?;
    catalog.ping().await?;
    Ok(catalog)
}

/// Forwards SIGINT to the poller's shutdown channel
///
/// The poller observes the flag at its sleep boundary, so in-flight tool
/// runs always finish before the process exits.
fn spawn_signal_listener(shutdown: watch::Sender<bool>) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        info!("Shutdown signal received, finishing in-flight work");
        let _ = shutdown.send(true);
    });
}
