//! Backend identity and immutable per-backend settings.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::config::schema::{BackendConfig, CircuitBreakerConfig, HealthCheckConfig, RetryConfig};

/// The four backend services behind the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BackendName {
    Auth,
    Chat,
    Employee,
    Structure,
}

impl BackendName {
    pub const ALL: [BackendName; 4] = [
        BackendName::Auth,
        BackendName::Chat,
        BackendName::Employee,
        BackendName::Structure,
    ];

    /// Stable lowercase name used in logs, metrics and the `/health` body.
    pub fn as_str(self) -> &'static str {
        match self {
            BackendName::Auth => "auth",
            BackendName::Chat => "chat",
            BackendName::Employee => "employee",
            BackendName::Structure => "structure",
        }
    }
}

impl fmt::Display for BackendName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for BackendName {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Rejected backend address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid backend address '{address}': {reason}")]
pub struct AddressError {
    pub address: String,
    pub reason: String,
}

/// Parse a backend address. `host:port` without a scheme means plain http.
pub fn parse_address(raw: &str) -> Result<Url, AddressError> {
    let raw = raw.trim();
    let candidate = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{}", raw)
    };

    let fail = |reason: String| AddressError {
        address: raw.to_string(),
        reason,
    };

    let url = Url::parse(&candidate).map_err(|e| fail(e.to_string()))?;
    match url.scheme() {
        "http" => {}
        other => return Err(fail(format!("unsupported scheme '{}'", other))),
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(fail("missing host".to_string()));
    }
    Ok(url)
}

/// Everything the gateway knows about one backend. Built once at startup.
#[derive(Debug, Clone)]
pub struct BackendTarget {
    pub name: BackendName,
    pub address: Url,
    pub call_timeout: Duration,
    pub retry: RetryConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub health_interval: Duration,
}

impl BackendTarget {
    pub fn from_config(
        name: BackendName,
        config: &BackendConfig,
        health: &HealthCheckConfig,
    ) -> Result<Self, AddressError> {
        Ok(Self {
            name,
            address: parse_address(&config.address)?,
            call_timeout: Duration::from_millis(config.timeout_ms),
            retry: config.retry.clone(),
            circuit_breaker: config.circuit_breaker.clone(),
            health_interval: Duration::from_millis(
                config.health_interval_ms.unwrap_or(health.interval_ms),
            ),
        })
    }

    /// Join a path onto the backend base address.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.address.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
