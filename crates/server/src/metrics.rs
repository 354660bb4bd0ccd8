//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the harvester server:
//! - HTTP request metrics (latency, counts)
//! - Executor and catalog status (collected dynamically)
//! - Driver metrics from `harvester_core::metrics`

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

use crate::state::AppState;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "harvester_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 60.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("harvester_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "harvester_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Executor & Catalog Metrics (collected dynamically)
// =============================================================================

/// Jobs currently collecting.
pub static EXECUTOR_ACTIVE_JOBS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "harvester_executor_active_jobs",
        "Number of jobs currently holding an executor permit",
    )
    .unwrap()
});

/// Active work items in the catalog.
pub static CATALOG_ACTIVE_ITEMS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "harvester_catalog_active_items",
        "Number of active work items in the catalog",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Executor & catalog
    registry
        .register(Box::new(EXECUTOR_ACTIVE_JOBS.clone()))
        .unwrap();
    registry
        .register(Box::new(CATALOG_ACTIVE_ITEMS.clone()))
        .unwrap();

    // Core metrics (runs, jobs, barriers, merge)
    harvester_core::metrics::register_core_metrics(registry).unwrap();
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so gauges reflect the executor and catalog as they are now.
pub fn collect_dynamic_metrics(state: &AppState) {
    EXECUTOR_ACTIVE_JOBS.set(state.executor().stats().active_jobs as i64);

    if let Ok(items) = state.warehouse().tracked_items() {
        let active = items.iter().filter(|item| item.is_active).count();
        CATALOG_ACTIVE_ITEMS.set(active as i64);
    }
}
