use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

/// Root configuration
///
/// Every section is optional; an empty file yields a working configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub spider: SpiderConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Announcement listener configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SpiderConfig {
    #[serde(default = "default_spider_host")]
    pub host: IpAddr,
    /// Listen port. When unset the binary's own default applies.
    #[serde(default)]
    pub port: Option<u16>,
}

impl Default for SpiderConfig {
    fn default() -> Self {
        Self {
            host: default_spider_host(),
            port: None,
        }
    }
}

fn default_spider_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    /// How long a writer waits on a locked database before failing.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("trawler.db")
}

fn default_busy_timeout() -> u64 {
    5000
}

/// Retry configuration for catalog writes.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Total attempts, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Fixed delay between attempts in milliseconds.
    #[serde(default = "default_retry_delay")]
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_ms: default_retry_delay(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    2000
}

/// Which lifecycle an instance follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleMode {
    /// Run until a stop signal, then drain and exit.
    Graceful,
    /// Hand over to a fresh process after a number of events.
    SelfRestart,
}

/// Lifecycle configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LifecycleConfig {
    /// Overrides the binary's default mode.
    #[serde(default)]
    pub policy: Option<LifecycleMode>,
    /// Successfully stored events before a self-restarting instance hands over.
    #[serde(default = "default_restart_after")]
    pub restart_after_events: u64,
    /// Pause between spawning the successor and releasing resources.
    #[serde(default = "default_successor_grace")]
    pub successor_grace_ms: u64,
    /// Attempts to bind the listener while a predecessor still holds it.
    #[serde(default = "default_bind_attempts")]
    pub bind_attempts: u32,
    #[serde(default = "default_bind_retry_delay")]
    pub bind_retry_delay_ms: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            policy: None,
            restart_after_events: default_restart_after(),
            successor_grace_ms: default_successor_grace(),
            bind_attempts: default_bind_attempts(),
            bind_retry_delay_ms: default_bind_retry_delay(),
        }
    }
}

fn default_restart_after() -> u64 {
    100
}

fn default_successor_grace() -> u64 {
    1000
}

fn default_bind_attempts() -> u32 {
    10
}

fn default_bind_retry_delay() -> u64 {
    500
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Append-only operational log, mirrored to stdout.
    #[serde(default = "default_log_file")]
    pub file: PathBuf,
    /// Filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: default_log_file(),
            filter: default_log_filter(),
        }
    }
}

fn default_log_file() -> PathBuf {
    PathBuf::from("trawler.log")
}

fn default_log_filter() -> String {
    "info".to_string()
}

/// Metrics endpoint configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_host")]
    pub host: IpAddr,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_metrics_host(),
            port: default_metrics_port(),
        }
    }
}

fn default_metrics_host() -> IpAddr {
    IpAddr::from([127, 0, 0, 1])
}

fn default_metrics_port() -> u16 {
    9464
}
