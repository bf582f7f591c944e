//! Metrics collection and exposition.
//!
//! # Metrics
//! - `storage_proxy_requests_total` (counter): requests by method, route, status
//! - `storage_proxy_request_duration_seconds` (histogram): latency distribution
//! - `storage_proxy_backend_calls_total` (counter): storage calls by resource, outcome
//! - `storage_proxy_backend_duration_seconds` (histogram): storage call latency
//! - `storage_proxy_spans_exported_total` (counter): spans by export result
//!
//! Recording is a no-op until `init_metrics` installs the Prometheus recorder.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, route: &str, status: u16, start: Instant) {
    counter!(
        "storage_proxy_requests_total",
        "method" => method.to_string(),
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!(
        "storage_proxy_request_duration_seconds",
        "route" => route.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_backend_call(resource: &'static str, outcome: &'static str, start: Instant) {
    counter!(
        "storage_proxy_backend_calls_total",
        "resource" => resource,
        "outcome" => outcome
    )
    .increment(1);
    histogram!("storage_proxy_backend_duration_seconds", "resource" => resource)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_spans_exported(count: usize, success: bool) {
    let result = if success { "success" } else { "failure" };
    counter!("storage_proxy_spans_exported_total", "result" => result).increment(count as u64);
}
