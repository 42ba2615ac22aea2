//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): inbound requests by method, route, status
//! - `gateway_request_duration_seconds` (histogram): inbound latency
//! - `gateway_backend_calls_total` (counter): attempts by backend, operation, result
//! - `gateway_backend_call_duration_seconds` (histogram): attempt latency
//! - `gateway_backend_retries_total` (counter): retries issued per backend
//! - `gateway_circuit_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `gateway_backend_health` (gauge): 1=healthy, 0.5=degraded, 0=unavailable/unknown
//!
//! # Design Decisions
//! - Recorded through the `metrics` facade; without an installed recorder
//!   every call is a no-op
//! - Prometheus exposition on its own listener, only when enabled

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Label};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::backend::{BackendName, CallOutcome};
use crate::health::state::HealthStatus;
use crate::resilience::CircuitState;

/// Install the Prometheus recorder and its scrape listener.
///
/// Must be called from within the Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;

    describe_counter!("gateway_requests_total", "Inbound HTTP requests");
    describe_histogram!("gateway_request_duration_seconds", "Inbound HTTP request latency");
    describe_counter!("gateway_backend_calls_total", "Backend call attempts");
    describe_histogram!("gateway_backend_call_duration_seconds", "Backend call attempt latency");
    describe_counter!("gateway_backend_retries_total", "Backend call retries");
    describe_gauge!("gateway_circuit_state", "Circuit breaker state per backend");
    describe_gauge!("gateway_backend_health", "Advisory backend health");

    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &str, route: &str, status: u16, start: Instant) {
    let labels = vec![
        Label::new("method", method.to_string()),
        Label::new("route", route.to_string()),
        Label::new("status", status.to_string()),
    ];
    counter!("gateway_requests_total", labels.clone()).increment(1);
    histogram!("gateway_request_duration_seconds", labels).record(start.elapsed().as_secs_f64());
}

pub fn record_backend_call(outcome: &CallOutcome) {
    let labels = vec![
        Label::new("backend", outcome.backend.as_str()),
        Label::new("operation", outcome.operation),
        Label::new("result", outcome.result_label()),
    ];
    counter!("gateway_backend_calls_total", labels.clone()).increment(1);
    histogram!("gateway_backend_call_duration_seconds", labels).record(outcome.elapsed.as_secs_f64());
}

pub fn record_retry(backend: BackendName) {
    counter!("gateway_backend_retries_total", "backend" => backend.as_str()).increment(1);
}

pub fn record_circuit_state(backend: BackendName, state: CircuitState) {
    gauge!("gateway_circuit_state", "backend" => backend.as_str()).set(state.gauge_value());
}

pub fn record_backend_health(backend: BackendName, status: HealthStatus) {
    gauge!("gateway_backend_health", "backend" => backend.as_str()).set(status.gauge_value());
}
