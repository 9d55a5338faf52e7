// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the dual writer.
//!
//! This module provides metrics collection with the namespace prefix
//! `dualwrite_`. All collectors are process-wide and safe to increment from
//! concurrent requests.
//!
//! # Metrics Categories
//!
//! - **Request Metrics** - One observation per dual-writer operation
//! - **Store Metrics** - One observation per sub-call to the legacy or new store
//! - **Divergence Metrics** - Writes that reached the legacy store only
//!
//! # Example
//!
//! ```rust,no_run
//! use dualwrite::metrics::record_request;
//!
//! // Record a successful list in mode 2
//! record_request("2", "ConfigMap", "list", true, std::time::Duration::from_millis(12));
//! ```

use crate::constants::{OUTCOME_ERROR, OUTCOME_SUCCESS};
use prometheus::{
    CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::LazyLock;
use std::time::Duration;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all dual writer metrics (prometheus-safe)
const METRICS_NAMESPACE: &str = "dualwrite";

/// Latency buckets shared by all histograms, in seconds
const LATENCY_BUCKETS: [f64; 10] = [0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0];

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
///
/// All metrics are registered in this registry and can be exposed by the
/// embedding server through [`gather_metrics`].
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

fn register_counter(name: &str, help: &str, labels: &[&str]) -> CounterVec {
    let opts = Opts::new(format!("{METRICS_NAMESPACE}_{name}"), help);
    let counter = CounterVec::new(opts, labels).expect("metric definition is valid");
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .expect("metric is registered once");
    counter
}

fn register_histogram(name: &str, help: &str, labels: &[&str]) -> HistogramVec {
    let opts = HistogramOpts::new(format!("{METRICS_NAMESPACE}_{name}"), help)
        .buckets(LATENCY_BUCKETS.to_vec());
    let histogram = HistogramVec::new(opts, labels).expect("metric definition is valid");
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .expect("metric is registered once");
    histogram
}

// ============================================================================
// Request Metrics
// ============================================================================

/// Total number of dual writer operations
///
/// Labels:
/// - `mode`: Dual writer mode (e.g., `2`)
/// - `kind`: Resource kind (e.g., `ConfigMap`)
/// - `method`: Storage method (`create`, `get`, `list`, ...)
/// - `outcome`: `success` or `error`
pub static REQUESTS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    register_counter(
        "requests_total",
        "Total number of dual writer operations by mode, kind, method and outcome",
        &["mode", "kind", "method", "outcome"],
    )
});

/// Duration of dual writer operations in seconds
///
/// Labels:
/// - `mode`, `kind`, `method`
pub static REQUEST_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram(
        "request_duration_seconds",
        "Duration of dual writer operations in seconds",
        &["mode", "kind", "method"],
    )
});

// ============================================================================
// Store Metrics
// ============================================================================

/// Duration of individual store calls in seconds
///
/// Labels:
/// - `store`: `legacy` or `storage`
/// - `mode`, `kind`, `method`
/// - `is_error`: `true` or `false`
pub static STORE_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram(
        "store_duration_seconds",
        "Duration of calls into the legacy and new stores in seconds",
        &["store", "mode", "kind", "method", "is_error"],
    )
});

// ============================================================================
// Divergence Metrics
// ============================================================================

/// Writes that succeeded in the legacy store but failed in the new store
///
/// Labels:
/// - `mode`, `kind`, `method`
pub static DIVERGENCE_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    register_counter(
        "divergence_total",
        "Writes persisted to the legacy store but not to the new store",
        &["mode", "kind", "method"],
    )
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record one dual writer operation
///
/// # Arguments
/// * `mode` - Dual writer mode
/// * `kind` - Resource kind
/// * `method` - Storage method
/// * `success` - Whether the caller saw a success
/// * `duration` - Wall time of the whole operation
pub fn record_request(mode: &str, kind: &str, method: &str, success: bool, duration: Duration) {
    let outcome = if success { OUTCOME_SUCCESS } else { OUTCOME_ERROR };
    REQUESTS_TOTAL
        .with_label_values(&[mode, kind, method, outcome])
        .inc();
    REQUEST_DURATION_SECONDS
        .with_label_values(&[mode, kind, method])
        .observe(duration.as_secs_f64());
}

/// Record one call into a backing store
///
/// # Arguments
/// * `store` - `legacy` or `storage`
/// * `mode` - Dual writer mode
/// * `kind` - Resource kind
/// * `method` - Storage method
/// * `is_error` - Whether the store returned an error
/// * `duration` - Wall time of the call
pub fn record_store_call(
    store: &str,
    mode: &str,
    kind: &str,
    method: &str,
    is_error: bool,
    duration: Duration,
) {
    let is_error = if is_error { "true" } else { "false" };
    STORE_DURATION_SECONDS
        .with_label_values(&[store, mode, kind, method, is_error])
        .observe(duration.as_secs_f64());
}

/// Record a write that reached the legacy store only
///
/// # Arguments
/// * `mode` - Dual writer mode
/// * `kind` - Resource kind
/// * `method` - Storage method
pub fn record_divergence(mode: &str, kind: &str, method: &str) {
    DIVERGENCE_TOTAL
        .with_label_values(&[mode, kind, method])
        .inc();
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Returns
/// Prometheus-formatted metrics as a String
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}
