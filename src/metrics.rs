//! Prometheus metrics for proxied requests.
//!
//! The recorder is installed once per process; every router built afterwards
//! shares the same handle.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;
use tracing::warn;

static HANDLE: OnceLock<Option<PrometheusHandle>> = OnceLock::new();

/// Install the global Prometheus recorder (first call only).
///
/// Returns `None` when another recorder was already installed by the host
/// process; metrics are then simply not rendered at `/metrics`.
pub fn init() -> Option<PrometheusHandle> {
    HANDLE
        .get_or_init(|| match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Prometheus recorder not installed: {}", e);
                None
            }
        })
        .clone()
}

/// Count a finished request for `endpoint` with the status it produced.
pub fn record_request(endpoint: &'static str, status: u16) {
    counter!(
        "hls_proxy_requests_total",
        "endpoint" => endpoint,
        "status" => status.to_string()
    )
    .increment(1);
}

/// Observe the time spent serving `endpoint` since `start`.
pub fn record_duration(endpoint: &'static str, start: Instant) {
    histogram!("hls_proxy_request_duration_seconds", "endpoint" => endpoint)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_upstream_error(endpoint: &'static str) {
    counter!("hls_proxy_upstream_errors_total", "endpoint" => endpoint).increment(1);
}
