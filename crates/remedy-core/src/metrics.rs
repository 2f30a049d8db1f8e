//! Prometheus metrics helpers for the remedy pipeline.
//!
//! Centralized metrics initialization and the metric descriptions used
//! across the pipeline components.
//!
//! # Usage
//!
//! ```rust,ignore
//! use remedy_core::metrics::{init_metrics, start_metrics_server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let handle = init_metrics();
//!     start_metrics_server(9091, handle).await.unwrap();
//!
//!     metrics::counter!("healing_events_total").increment(1);
//! }
//! ```
//!
//! # Naming conventions
//!
//! - Prefix: component name (`healing_`, `eventlog_`, `billing_`, ...)
//! - Suffix: unit or type (`_total`, `_seconds`)
//! - Labels: used sparingly to avoid cardinality explosion

use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;

/// Initialize the Prometheus metrics recorder.
///
/// Must be called once at startup before any metrics are recorded.
/// Returns a handle for [`start_metrics_server`].
///
/// # Panics
///
/// Panics if called more than once (the recorder can only be installed once).
pub fn init_metrics() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder");

    register_common_metrics();

    handle
}

/// Like [`init_metrics`] but returns `None` if a recorder is already
/// installed instead of panicking. Useful for tests.
pub fn try_init_metrics() -> Option<PrometheusHandle> {
    PrometheusBuilder::new().install_recorder().ok()
}

/// Start the Prometheus metrics HTTP server.
///
/// Serves the `/metrics` endpoint on the given port in a background task
/// and returns immediately.
pub async fn start_metrics_server(
    port: u16,
    handle: PrometheusHandle,
) -> Result<(), std::io::Error> {
    let app = Router::new().route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Metrics server listening on http://{}/metrics", addr);

    tokio::spawn(async move {
        let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
        axum::serve(listener, app).await.unwrap();
    });

    Ok(())
}

/// Register descriptions for the metrics recorded across the pipeline.
///
/// Called automatically by [`init_metrics`].
fn register_common_metrics() {
    // =========================================================================
    // Healing event pipeline
    // =========================================================================

    describe_counter!(
        "healing_events_total",
        "Healing events submitted to the pipeline"
    );
    describe_counter!(
        "healing_events_deduped_total",
        "Healing events suppressed by the dedup window"
    );
    describe_counter!(
        "healing_events_recorded_total",
        "Healing events durably appended to the event log"
    );

    // =========================================================================
    // Event log integrity
    // =========================================================================

    describe_counter!(
        "eventlog_header_repairs_total",
        "Schema drift repairs (header rewritten, rows preserved)"
    );
    describe_counter!(
        "eventlog_recreations_total",
        "Event log recreations after corruption or a failed write"
    );

    // =========================================================================
    // Billing
    // =========================================================================

    describe_counter!(
        "billing_charges_total",
        "Billing attempts by outcome tier (label: tier)"
    );

    // =========================================================================
    // Notifications
    // =========================================================================

    describe_counter!(
        "notifications_total",
        "Notification events recorded to the notification log"
    );
    describe_counter!(
        "notifications_deduped_total",
        "Notification events suppressed by the dedup window"
    );

    describe_gauge!(
        "dedup_keys",
        "Identity keys currently tracked by a dedup gate"
    );
}

/// Record one billing attempt with its outcome tier label.
pub fn record_billing_tier(tier: &'static str) {
    metrics::counter!("billing_charges_total", "tier" => tier).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Once;

    // Ensure metrics are initialized exactly once for all tests
    static INIT: Once = Once::new();

    fn ensure_metrics_init() {
        INIT.call_once(|| {
            let _ = try_init_metrics();
        });
    }

    #[test]
    fn test_try_init_metrics_idempotent() {
        let handle1 = try_init_metrics();
        let handle2 = try_init_metrics();

        // At most one install can succeed
        assert!(handle1.is_none() || handle2.is_none());
    }

    #[test]
    fn test_register_common_metrics_does_not_panic() {
        ensure_metrics_init();
        register_common_metrics();
        register_common_metrics();
    }

    #[test]
    fn test_record_billing_tier_does_not_panic() {
        ensure_metrics_init();
        record_billing_tier("simulated");
        record_billing_tier("success");
    }
}
