//! The backend call abstraction.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::backend::{BackendName, CallError, FailureKind};
use crate::health::state::HealthStatus;

/// Request-scoped metadata forwarded with every call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallMetadata {
    pub request_id: String,
    pub trace_id: String,
    pub authorization: Option<String>,
}

/// One remote invocation.
#[derive(Debug, Clone)]
pub struct BackendCall {
    pub operation: &'static str,
    pub payload: Value,
    /// Budget of this attempt; the transport passes it to the backend.
    pub timeout: Duration,
    pub metadata: CallMetadata,
}

/// Remote invocation against one backend.
#[async_trait]
pub trait BackendClient: Send + Sync {
    /// Perform one attempt. Retries and breaker gating happen above this.
    async fn invoke(&self, call: BackendCall) -> Result<Value, CallError>;

    /// Cheap reachability check for the health monitor.
    async fn probe(&self, timeout: Duration) -> HealthStatus;
}

/// Record of one attempt, consumed by logging, metrics and passive health.
#[derive(Debug, Clone)]
pub struct CallOutcome {
    pub backend: BackendName,
    pub operation: &'static str,
    /// Zero-based attempt index.
    pub attempt: u32,
    pub success: bool,
    pub kind: Option<FailureKind>,
    pub message: Option<String>,
    pub elapsed: Duration,
    /// Set when the backend was unreachable.
    pub connection_failure: bool,
}

impl CallOutcome {
    pub fn success(backend: BackendName, operation: &'static str, attempt: u32, elapsed: Duration) -> Self {
        Self {
            backend,
            operation,
            attempt,
            success: true,
            kind: None,
            message: None,
            elapsed,
            connection_failure: false,
        }
    }

    pub fn failure(
        backend: BackendName,
        operation: &'static str,
        attempt: u32,
        error: &CallError,
        elapsed: Duration,
    ) -> Self {
        Self {
            backend,
            operation,
            attempt,
            success: false,
            kind: Some(error.kind()),
            message: Some(error.message()),
            elapsed,
            connection_failure: matches!(error, CallError::Connection { .. }),
        }
    }

    /// True if this outcome says the backend itself is in trouble.
    pub fn is_backend_fault(&self) -> bool {
        self.connection_failure || self.kind.is_some_and(FailureKind::counts_against_backend)
    }

    /// Label for the calls counter.
    pub fn result_label(&self) -> &'static str {
        match (self.success, self.kind) {
            (true, _) => "success",
            (false, _) if self.connection_failure => "connection_error",
            (false, Some(kind)) => kind.code(),
            (false, None) => "unknown",
        }
    }
}
