//! Prometheus metrics endpoint.
//!
//! Serves the core ingest metrics plus catalog gauges that are refreshed from
//! the store on every scrape:
//! - `GET /metrics` - Prometheus text format
//! - `GET /health` - liveness probe

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntGauge, Registry, TextEncoder};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::warn;
use trawler_core::TorrentCatalog;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Torrents stored in the catalog (collected on scrape).
pub static CATALOG_TORRENTS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "trawler_catalog_torrents",
        "Number of torrents in the catalog",
    )
    .unwrap()
});

/// Files stored in the catalog (collected on scrape).
pub static CATALOG_FILES: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "trawler_catalog_files",
        "Number of file rows in the catalog",
    )
    .unwrap()
});

/// Announcements recorded across all entries (collected on scrape).
pub static CATALOG_ANNOUNCES: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "trawler_catalog_announces",
        "Sum of announce counts over all catalog entries",
    )
    .unwrap()
});

fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(CATALOG_TORRENTS.clone()))
        .unwrap();
    registry.register(Box::new(CATALOG_FILES.clone())).unwrap();
    registry
        .register(Box::new(CATALOG_ANNOUNCES.clone()))
        .unwrap();

    for metric in trawler_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Refresh the catalog gauges.
///
/// A closed catalog (during a hand-over) leaves the last values in place.
pub fn collect_catalog_metrics(catalog: &dyn TorrentCatalog) {
    if let Ok(stats) = catalog.stats() {
        CATALOG_TORRENTS.set(stats.total_torrents as i64);
        CATALOG_FILES.set(stats.total_files as i64);
        CATALOG_ANNOUNCES.set(stats.total_announces as i64);
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

async fn metrics(State(catalog): State<Arc<dyn TorrentCatalog>>) -> Response {
    collect_catalog_metrics(catalog.as_ref());
    match encode_metrics() {
        Ok(body) => (
            [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
            body,
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub fn create_router(catalog: Arc<dyn TorrentCatalog>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(catalog)
}

/// Serve the metrics router until `shutdown` fires or its sender is dropped.
pub async fn serve(
    listener: TcpListener,
    catalog: Arc<dyn TorrentCatalog>,
    mut shutdown: broadcast::Receiver<()>,
) -> std::io::Result<()> {
    axum::serve(listener, create_router(catalog))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
}
