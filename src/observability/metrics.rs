//! Metrics collection and exposition.
//!
//! # Metrics
//! - `tap_admin_requests_total` (counter): requests by method, route, status
//! - `tap_admin_request_duration_seconds` (histogram): latency by method, route
//! - `tap_admin_rate_limit_total` (counter): limiter outcomes
//! - `tap_admin_auth_rejections_total` (counter): gate rejections by gate, code
//! - `tap_admin_store_errors_total` (counter): store failures by operation
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, so tests need no setup
//! - Routes are labelled by their matched pattern, never the raw path

use axum::{
    body::Body,
    extract::MatchedPath,
    http::Request,
    middleware::Next,
    response::Response,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, route: &str, status: u16, start: Instant) {
    metrics::counter!(
        "tap_admin_requests_total",
        "method" => method.to_string(),
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!(
        "tap_admin_request_duration_seconds",
        "method" => method.to_string(),
        "route" => route.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limit(outcome: &'static str) {
    metrics::counter!("tap_admin_rate_limit_total", "outcome" => outcome).increment(1);
}

pub fn record_auth_rejection(gate: &'static str, code: &'static str) {
    metrics::counter!("tap_admin_auth_rejections_total", "gate" => gate, "code" => code).increment(1);
}

pub fn record_store_error(operation: &'static str) {
    metrics::counter!("tap_admin_store_errors_total", "operation" => operation).increment(1);
}

/// Middleware recording count and latency for every request.
pub async fn track_requests(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(request).await;
    record_request(&method, &route, response.status().as_u16(), start);
    response
}
