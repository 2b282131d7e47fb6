//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_http_requests_total` (counter): relayed HTTP requests by method, status
//! - `relay_http_request_duration_seconds` (histogram): time to upstream response head
//! - `relay_upstream_errors_total` (counter): upstream failures by kind
//! - `relay_websocket_sessions` (gauge): live relay pairs
//! - `relay_websocket_closed_total` (counter): finished relay pairs by close code
//!
//! Without an installed recorder every call is a no-op.

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Start the Prometheus scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    metrics::counter!(
        "relay_http_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("relay_http_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_upstream_error(kind: &'static str) {
    metrics::counter!("relay_upstream_errors_total", "kind" => kind).increment(1);
}

pub fn websocket_opened() {
    metrics::gauge!("relay_websocket_sessions").increment(1.0);
}

pub fn websocket_closed(code: Option<u16>) {
    metrics::gauge!("relay_websocket_sessions").decrement(1.0);
    let code = code.map_or_else(|| "none".to_string(), |c| c.to_string());
    metrics::counter!("relay_websocket_closed_total", "code" => code).increment(1);
}
