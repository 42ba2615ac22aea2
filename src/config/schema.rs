//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.
//! Durations are expressed in milliseconds.

use serde::{Deserialize, Serialize};

use crate::backend::BackendName;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Inbound request handling.
    pub server: ServerConfig,

    /// One entry per backend service.
    pub backends: BackendsConfig,

    /// Health monitoring settings.
    pub health_check: HealthCheckConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Inbound request limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Overall budget of one inbound request, including every retry.
    pub request_timeout_ms: u64,

    /// Largest accepted request body in bytes.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 30_000,
            max_body_bytes: 4 * 1024 * 1024,
        }
    }
}

/// The four backend services, each tuned independently.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendsConfig {
    pub auth: BackendConfig,
    pub chat: BackendConfig,
    pub employee: BackendConfig,
    pub structure: BackendConfig,
}

impl Default for BackendsConfig {
    fn default() -> Self {
        Self {
            auth: BackendConfig::with_address("http://auth-service:9090"),
            chat: BackendConfig::with_address("http://chat-service:9092"),
            employee: BackendConfig::with_address("http://employee-service:9091"),
            structure: BackendConfig::with_address("http://structure-service:9093"),
        }
    }
}

impl BackendsConfig {
    /// Configuration of one backend.
    pub fn get(&self, name: BackendName) -> &BackendConfig {
        match name {
            BackendName::Auth => &self.auth,
            BackendName::Chat => &self.chat,
            BackendName::Employee => &self.employee,
            BackendName::Structure => &self.structure,
        }
    }

    /// Mutable configuration of one backend.
    pub fn get_mut(&mut self, name: BackendName) -> &mut BackendConfig {
        match name {
            BackendName::Auth => &mut self.auth,
            BackendName::Chat => &mut self.chat,
            BackendName::Employee => &mut self.employee,
            BackendName::Structure => &mut self.structure,
        }
    }
}

/// Backend service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Backend address (e.g., "http://127.0.0.1:9090"). A missing scheme means http.
    pub address: String,

    /// Per-attempt call timeout.
    pub timeout_ms: u64,

    /// Retry policy for calls to this backend.
    pub retry: RetryConfig,

    /// Circuit breaker policy for this backend.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Probe interval override; falls back to `health_check.interval_ms`.
    pub health_interval_ms: Option<u64>,
}

impl BackendConfig {
    pub fn with_address(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            address: "http://127.0.0.1:9090".to_string(),
            timeout_ms: 10_000,
            retry: RetryConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            health_interval_ms: None,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, the first call included.
    pub max_attempts: u32,

    /// Delay before the first retry.
    pub initial_delay_ms: u64,

    /// Upper bound of any single delay.
    pub max_delay_ms: u64,

    /// Growth factor between consecutive delays.
    pub multiplier: f64,

    /// Random extra delay as a fraction of the computed delay (0.0 disables jitter).
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay_ms: 100,
            max_delay_ms: 5_000,
            multiplier: 2.0,
            jitter: 0.0,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Failures within `interval_ms` that open the circuit.
    pub failure_threshold: u32,

    /// Successful trial calls needed to close a half-open circuit.
    pub success_threshold: u32,

    /// Trial calls allowed in flight while half-open.
    pub max_half_open_requests: u32,

    /// Length of the closed-state failure window.
    pub interval_ms: u64,

    /// Time spent open before trial calls are let through.
    pub open_timeout_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 1,
            max_half_open_requests: 1,
            interval_ms: 60_000,
            open_timeout_ms: 60_000,
        }
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable the background probe loops.
    pub enabled: bool,

    /// Default probe interval.
    pub interval_ms: u64,

    /// Probe timeout.
    pub timeout_ms: u64,

    /// Path probed on each backend.
    pub path: String,

    /// Consecutive failed calls that downgrade a healthy backend.
    pub passive_failure_threshold: u32,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 30_000,
            timeout_ms: 5_000,
            path: "/health".to_string(),
            passive_failure_threshold: 3,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9100".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_service_deployment() {
        let config = GatewayConfig::default();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.backends.chat.address, "http://chat-service:9092");
        assert_eq!(config.backends.auth.retry.max_attempts, 4);
        assert_eq!(config.backends.auth.circuit_breaker.failure_threshold, 5);
        assert_eq!(config.health_check.interval_ms, 30_000);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let raw = r#"
            [backends.chat]
            address = "http://127.0.0.1:7000"

            [backends.chat.circuit_breaker]
            failure_threshold = 2
        "#;
        let config: GatewayConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.backends.chat.address, "http://127.0.0.1:7000");
        assert_eq!(config.backends.chat.circuit_breaker.failure_threshold, 2);
        assert_eq!(config.backends.chat.circuit_breaker.open_timeout_ms, 60_000);
        assert_eq!(config.backends.auth.address, "http://auth-service:9090");
    }

    #[test]
    fn log_format_is_lowercase() {
        let config: ObservabilityConfig = toml::from_str("log_format = \"pretty\"").unwrap();
        assert_eq!(config.log_format, LogFormat::Pretty);
    }
}
