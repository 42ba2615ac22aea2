//! Per-backend health status.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::backend::BackendName;

/// Advisory status of one backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Unknown,
    Healthy,
    Degraded,
    Unavailable,
}

impl HealthStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            HealthStatus::Unknown => "unknown",
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unavailable => "unavailable",
        }
    }

    /// Gauge value: 1 healthy, 0.5 degraded, 0 otherwise.
    pub fn gauge_value(self) -> f64 {
        match self {
            HealthStatus::Healthy => 1.0,
            HealthStatus::Degraded => 0.5,
            HealthStatus::Unknown | HealthStatus::Unavailable => 0.0,
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Latest known state of one backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthSnapshot {
    pub backend: BackendName,
    pub status: HealthStatus,
    pub last_check: Option<DateTime<Utc>>,
    pub detail: Option<String>,
}

impl HealthSnapshot {
    pub fn unknown(backend: BackendName) -> Self {
        Self {
            backend,
            status: HealthStatus::Unknown,
            last_check: None,
            detail: None,
        }
    }
}
