//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, thresholds >= 1)
//! - Check every backend address parses as a URL
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::backend::{target::parse_address, BackendName};
use crate::config::schema::{BackendConfig, GatewayConfig};

/// Upper bound on the per-request budget: one day.
const MAX_REQUEST_TIMEOUT_MS: u64 = 86_400_000;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Check the whole configuration, collecting every problem.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.server.request_timeout_ms == 0 {
        errors.push(ValidationError::new("server.request_timeout_ms", "must be > 0"));
    } else if config.server.request_timeout_ms > MAX_REQUEST_TIMEOUT_MS {
        errors.push(ValidationError::new(
            "server.request_timeout_ms",
            format!("must be <= {} (one day)", MAX_REQUEST_TIMEOUT_MS),
        ));
    }
    if config.server.max_body_bytes == 0 {
        errors.push(ValidationError::new("server.max_body_bytes", "must be > 0"));
    }
    if config.health_check.interval_ms == 0 {
        errors.push(ValidationError::new("health_check.interval_ms", "must be > 0"));
    }
    if config.health_check.timeout_ms == 0 {
        errors.push(ValidationError::new("health_check.timeout_ms", "must be > 0"));
    }
    if !config.health_check.path.starts_with('/') {
        errors.push(ValidationError::new("health_check.path", "must start with '/'"));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "is not a socket address",
        ));
    }

    for name in BackendName::ALL {
        validate_backend(name, config.backends.get(name), &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_backend(name: BackendName, backend: &BackendConfig, errors: &mut Vec<ValidationError>) {
    let field = |suffix: &str| format!("backends.{}.{}", name, suffix);

    if let Err(e) = parse_address(&backend.address) {
        errors.push(ValidationError::new(field("address"), e.to_string()));
    }
    if backend.timeout_ms == 0 {
        errors.push(ValidationError::new(field("timeout_ms"), "must be > 0"));
    }
    if backend.health_interval_ms == Some(0) {
        errors.push(ValidationError::new(field("health_interval_ms"), "must be > 0"));
    }

    let retry = &backend.retry;
    if retry.max_attempts == 0 {
        errors.push(ValidationError::new(field("retry.max_attempts"), "must be >= 1"));
    }
    if retry.multiplier.is_nan() || retry.multiplier < 1.0 {
        errors.push(ValidationError::new(field("retry.multiplier"), "must be >= 1.0"));
    }
    if retry.max_delay_ms < retry.initial_delay_ms {
        errors.push(ValidationError::new(
            field("retry.max_delay_ms"),
            "must be >= retry.initial_delay_ms",
        ));
    }
    if !(0.0..=1.0).contains(&retry.jitter) {
        errors.push(ValidationError::new(field("retry.jitter"), "must be within 0.0..=1.0"));
    }

    let breaker = &backend.circuit_breaker;
    if breaker.failure_threshold == 0 {
        errors.push(ValidationError::new(field("circuit_breaker.failure_threshold"), "must be >= 1"));
    }
    if breaker.success_threshold == 0 {
        errors.push(ValidationError::new(field("circuit_breaker.success_threshold"), "must be >= 1"));
    }
    if breaker.max_half_open_requests == 0 {
        errors.push(ValidationError::new(
            field("circuit_breaker.max_half_open_requests"),
            "must be >= 1",
        ));
    }
    if breaker.interval_ms == 0 {
        errors.push(ValidationError::new(field("circuit_breaker.interval_ms"), "must be > 0"));
    }
    if breaker.open_timeout_ms == 0 {
        errors.push(ValidationError::new(field("circuit_breaker.open_timeout_ms"), "must be > 0"));
    }
}
