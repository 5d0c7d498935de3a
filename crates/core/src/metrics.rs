//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Ingestion (announcements by outcome, upsert latency)
//! - Retries (attempts by operation)
//! - Lifecycle (state transitions)

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, IntCounterVec, Opts};

// =============================================================================
// Ingestion
// =============================================================================

/// Announcements processed, by outcome.
pub static ANNOUNCEMENTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("trawler_announcements_total", "Total announcements processed"),
        &["outcome"], // "created", "updated", "skipped", "rejected", "failed"
    )
    .unwrap()
});

/// Upsert duration in seconds, including retries.
pub static UPSERT_DURATION: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "trawler_upsert_duration_seconds",
            "Duration of catalog upserts including retries",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0]),
    )
    .unwrap()
});

// =============================================================================
// Retries
// =============================================================================

/// Failed attempts that were followed by another attempt.
pub static RETRY_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("trawler_retry_attempts_total", "Total retried attempts"),
        &["operation"], // "upsert", "bind"
    )
    .unwrap()
});

// =============================================================================
// Lifecycle
// =============================================================================

/// Ingest state transitions, by target state.
pub static LIFECYCLE_TRANSITIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "trawler_lifecycle_transitions_total",
            "Total ingest lifecycle transitions",
        ),
        &["state"], // "draining", "restarting", "stopped"
    )
    .unwrap()
});

/// Returns all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(ANNOUNCEMENTS_TOTAL.clone()),
        Box::new(UPSERT_DURATION.clone()),
        Box::new(RETRY_ATTEMPTS.clone()),
        Box::new(LIFECYCLE_TRANSITIONS.clone()),
    ]
}
