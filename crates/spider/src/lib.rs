//! Spider process: wires configuration, logging, the catalog, the announce
//! socket and the lifecycle supervisor together.

pub mod cli;
pub mod logging;
pub mod metrics;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{info, warn};

use trawler_core::{
    load_config, validate_config, Config, LifecycleMode, LifecyclePolicy, ProcessRespawner,
    RetryPolicy, SocketFeed, SqliteCatalog, Supervisor, TorrentCatalog,
};

use cli::Cli;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The two deployable spider flavours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// Runs until stopped.
    Standard,
    /// Hands over to a fresh process after a batch of events.
    Recycling,
}

impl Variant {
    pub fn name(self) -> &'static str {
        match self {
            Self::Standard => "trawler",
            Self::Recycling => "trawler-recycler",
        }
    }

    pub fn default_port(self) -> u16 {
        match self {
            Self::Standard => 6881,
            Self::Recycling => 6882,
        }
    }

    pub fn default_mode(self) -> LifecycleMode {
        match self {
            Self::Standard => LifecycleMode::Graceful,
            Self::Recycling => LifecycleMode::SelfRestart,
        }
    }

    /// Address the announce socket binds to.
    pub fn listen_addr(self, config: &Config) -> SocketAddr {
        SocketAddr::new(
            config.spider.host,
            config.spider.port.unwrap_or(self.default_port()),
        )
    }
}

/// Policy for binding ports a predecessor may still hold.
pub fn bind_retry_policy(config: &Config) -> RetryPolicy {
    RetryPolicy::new(
        config.lifecycle.bind_attempts,
        Duration::from_millis(config.lifecycle.bind_retry_delay_ms),
    )
}

/// Run a spider until it stops or hands over to its successor.
pub async fn run(variant: Variant) -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(&cli.config)
        .with_context(|| format!("Failed to load config from {:?}", cli.config))?;
    cli.apply(&mut config);
    validate_config(&config).context("Configuration validation failed")?;

    logging::init(&config.logging)?;

    info!(
        variant = variant.name(),
        version = VERSION,
        "Loaded configuration from {:?}",
        cli.config
    );
    info!("Database path: {:?}", config.database.path);

    let catalog: Arc<dyn TorrentCatalog> = Arc::new(
        SqliteCatalog::open(
            &config.database.path,
            Duration::from_millis(config.database.busy_timeout_ms),
        )
        .context("Failed to open torrent catalog")?,
    );
    info!("Torrent catalog initialized");

    let bind_retry = bind_retry_policy(&config);
    let addr = variant.listen_addr(&config);
    let mut feed = SocketFeed::bind(addr, &bind_retry)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let (shutdown_tx, supervisor_rx) = broadcast::channel(1);

    let metrics_task = if config.metrics.enabled {
        let metrics_addr = SocketAddr::new(config.metrics.host, config.metrics.port);
        let listener = bind_retry
            .run("metrics bind", || TcpListener::bind(metrics_addr))
            .await
            .with_context(|| format!("Failed to bind metrics endpoint to {}", metrics_addr))?;
        info!("Serving metrics on {}", metrics_addr);
        Some(tokio::spawn(metrics::serve(
            listener,
            Arc::clone(&catalog),
            shutdown_tx.subscribe(),
        )))
    } else {
        None
    };

    let signal_tx = shutdown_tx.clone();
    let signal_task = tokio::spawn(async move {
        shutdown_signal().await;
        info!("Stop signal received");
        let _ = signal_tx.send(());
    });

    let policy = LifecyclePolicy::from_config(&config.lifecycle, variant.default_mode());
    let respawner =
        Arc::new(ProcessRespawner::current().context("Failed to resolve own executable")?);
    let mut supervisor = Supervisor::new(
        policy,
        Arc::clone(&catalog),
        respawner,
        RetryPolicy::from(&config.retry),
    )
    .with_successor_grace(Duration::from_millis(config.lifecycle.successor_grace_ms));

    info!(?policy, "Ingesting announcements");
    let exit = supervisor.run(&mut feed, supervisor_rx).await;

    signal_task.abort();
    let _ = shutdown_tx.send(());
    if let Some(task) = metrics_task {
        match task.await {
            Ok(Err(e)) => warn!(error = %e, "Metrics endpoint failed"),
            Err(e) => warn!(error = %e, "Metrics task panicked"),
            Ok(Ok(())) => {}
        }
    }

    info!(
        reason = ?exit.reason,
        received = exit.stats.received,
        created = exit.stats.created,
        updated = exit.stats.updated,
        skipped = exit.stats.skipped,
        rejected = exit.stats.rejected,
        failed = exit.stats.failed,
        "Spider stopped"
    );

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
pub async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trawler_core::load_config_from_str;

    #[test]
    fn test_variant_defaults() {
        assert_eq!(Variant::Standard.default_port(), 6881);
        assert_eq!(Variant::Recycling.default_port(), 6882);
        assert_eq!(Variant::Standard.default_mode(), LifecycleMode::Graceful);
        assert_eq!(Variant::Recycling.default_mode(), LifecycleMode::SelfRestart);
    }

    #[test]
    fn test_listen_addr_prefers_configured_port() {
        let config = load_config_from_str("[spider]\nhost = \"127.0.0.1\"\nport = 7100\n").unwrap();
        assert_eq!(
            Variant::Recycling.listen_addr(&config),
            "127.0.0.1:7100".parse::<SocketAddr>().unwrap()
        );

        let config = Config::default();
        assert_eq!(Variant::Recycling.listen_addr(&config).port(), 6882);
        assert_eq!(Variant::Standard.listen_addr(&config).port(), 6881);
    }

    #[test]
    fn test_recycler_policy_unless_overridden() {
        let config = Config::default();
        assert_eq!(
            LifecyclePolicy::from_config(&config.lifecycle, Variant::Recycling.default_mode()),
            LifecyclePolicy::SelfRestart { after_events: 100 }
        );

        let config = load_config_from_str("[lifecycle]\npolicy = \"graceful\"\n").unwrap();
        assert_eq!(
            LifecyclePolicy::from_config(&config.lifecycle, Variant::Recycling.default_mode()),
            LifecyclePolicy::GracefulShutdown
        );
    }

    #[test]
    fn test_bind_retry_policy_from_config() {
        let config = Config::default();
        let policy = bind_retry_policy(&config);
        assert_eq!(policy.max_attempts, 10);
        assert_eq!(policy.delay, Duration::from_millis(500));
    }
}
