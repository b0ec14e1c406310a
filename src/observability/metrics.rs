//! Metrics collection and exposition.
//!
//! # Metrics
//! - `webapp_requests_total` (counter): requests by application, method, status
//! - `webapp_request_duration_seconds` (histogram): dispatch latency
//! - `webapp_component_errors_total` (counter): component errors by name
//! - `webapp_error_handler_invocations_total` (counter): routed errors by handler
//! - `webapp_reloads_total` (counter): repository reloads by outcome
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - Prometheus exporter runs its own HTTP listener

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::model::QName;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(app: &str, method: &str, status: u16, start: Instant) {
    counter!(
        "webapp_requests_total",
        "app" => app.to_string(),
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("webapp_request_duration_seconds", "app" => app.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_component_error(app: &str, error: &QName) {
    counter!(
        "webapp_component_errors_total",
        "app" => app.to_string(),
        "error" => error.eqname()
    )
    .increment(1);
}

pub fn record_error_routed(handler: &str) {
    counter!("webapp_error_handler_invocations_total", "handler" => handler.to_string())
        .increment(1);
}

/// `outcome` is one of `loaded`, `failed`, `removed`.
pub fn record_reload(outcome: &'static str, count: usize) {
    counter!("webapp_reloads_total", "outcome" => outcome).increment(count as u64);
}
