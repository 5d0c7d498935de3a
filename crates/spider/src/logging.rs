//! Logging setup: stdout plus an append-only log file.

use std::fs::{File, OpenOptions};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use trawler_core::config::LoggingConfig;

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `[logging].filter`. The log file is opened in append
/// mode; failing to open it aborts startup.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = build_filter(config)?;
    let file = open_log_file(config)?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        .init();

    Ok(())
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.filter)
            .with_context(|| format!("Invalid log filter {:?}", config.filter)),
    }
}

fn open_log_file(config: &LoggingConfig) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.file)
        .with_context(|| format!("Failed to open log file {:?}", config.file))
}
