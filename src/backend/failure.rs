//! Failure classification for backend calls.
//!
//! Every error a backend call can produce is reduced to a [`FailureKind`].
//! The kind decides three things downstream: whether the retrier tries
//! again, whether the circuit breaker counts it, and which HTTP status the
//! client sees.

use std::fmt;

use thiserror::Error;

use crate::backend::BackendName;

/// Classified reason a backend call did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    InvalidInput,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    ResourceExhausted,
    FailedPrecondition,
    Unauthenticated,
    Unavailable,
    DeadlineExceeded,
    Internal,
    Unimplemented,
    Unknown,
    OutOfRange,
    Aborted,
    Cancelled,
    DataLoss,
}

impl FailureKind {
    pub const ALL: [FailureKind; 16] = [
        FailureKind::InvalidInput,
        FailureKind::NotFound,
        FailureKind::AlreadyExists,
        FailureKind::PermissionDenied,
        FailureKind::ResourceExhausted,
        FailureKind::FailedPrecondition,
        FailureKind::Unauthenticated,
        FailureKind::Unavailable,
        FailureKind::DeadlineExceeded,
        FailureKind::Internal,
        FailureKind::Unimplemented,
        FailureKind::Unknown,
        FailureKind::OutOfRange,
        FailureKind::Aborted,
        FailureKind::Cancelled,
        FailureKind::DataLoss,
    ];

    /// Stable error code, also used on the backend wire.
    pub fn code(self) -> &'static str {
        match self {
            FailureKind::InvalidInput => "invalid-input",
            FailureKind::NotFound => "not-found",
            FailureKind::AlreadyExists => "already-exists",
            FailureKind::PermissionDenied => "permission-denied",
            FailureKind::ResourceExhausted => "resource-exhausted",
            FailureKind::FailedPrecondition => "failed-precondition",
            FailureKind::Unauthenticated => "unauthenticated",
            FailureKind::Unavailable => "unavailable",
            FailureKind::DeadlineExceeded => "deadline-exceeded",
            FailureKind::Internal => "internal",
            FailureKind::Unimplemented => "unimplemented",
            FailureKind::Unknown => "unknown",
            FailureKind::OutOfRange => "out-of-range",
            FailureKind::Aborted => "aborted",
            FailureKind::Cancelled => "cancelled",
            FailureKind::DataLoss => "data-loss",
        }
    }

    /// Parse a code. Accepts kebab, snake and upper-case spellings.
    pub fn from_code(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase().replace('_', "-");
        let normalized = match normalized.as_str() {
            "invalid-argument" => "invalid-input",
            "canceled" => "cancelled",
            other => other,
        };
        Self::ALL.into_iter().find(|kind| kind.code() == normalized)
    }

    /// Best guess for a backend answer that carried no usable code.
    pub fn from_http_status(status: u16) -> Self {
        match status {
            400 => FailureKind::InvalidInput,
            401 => FailureKind::Unauthenticated,
            403 => FailureKind::PermissionDenied,
            404 => FailureKind::NotFound,
            408 | 504 => FailureKind::DeadlineExceeded,
            409 => FailureKind::AlreadyExists,
            412 => FailureKind::FailedPrecondition,
            416 => FailureKind::OutOfRange,
            429 => FailureKind::ResourceExhausted,
            499 => FailureKind::Cancelled,
            501 => FailureKind::Unimplemented,
            502 | 503 => FailureKind::Unavailable,
            500..=599 => FailureKind::Internal,
            _ => FailureKind::Unknown,
        }
    }

    /// Transient kinds worth another attempt.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            FailureKind::Unavailable
                | FailureKind::DeadlineExceeded
                | FailureKind::ResourceExhausted
                | FailureKind::FailedPrecondition
                | FailureKind::Aborted
        )
    }

    /// Kinds that say the backend itself is unhealthy. The rest mean the
    /// backend answered and judged the request.
    pub fn counts_against_backend(self) -> bool {
        matches!(
            self,
            FailureKind::Unavailable
                | FailureKind::DeadlineExceeded
                | FailureKind::ResourceExhausted
                | FailureKind::Internal
                | FailureKind::Unknown
                | FailureKind::DataLoss
                | FailureKind::Aborted
        )
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Error returned by a backend call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    /// Classified failure reported by the backend or by timeout enforcement.
    #[error("{kind}: {message}")]
    Backend { kind: FailureKind, message: String },

    /// The circuit breaker refused the call; the backend was not contacted.
    #[error("circuit breaker open for {backend}")]
    CircuitOpen { backend: BackendName },

    /// The backend could not be reached at all.
    #[error("connection failed: {message}")]
    Connection { message: String },
}

impl CallError {
    pub fn backend(kind: FailureKind, message: impl Into<String>) -> Self {
        CallError::Backend {
            kind,
            message: message.into(),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        CallError::Connection {
            message: message.into(),
        }
    }

    pub fn deadline_exceeded(message: impl Into<String>) -> Self {
        Self::backend(FailureKind::DeadlineExceeded, message)
    }

    /// Kind used for logs, metrics and status mapping.
    pub fn kind(&self) -> FailureKind {
        match self {
            CallError::Backend { kind, .. } => *kind,
            CallError::CircuitOpen { .. } | CallError::Connection { .. } => FailureKind::Unavailable,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            CallError::Backend { kind, .. } => kind.is_retryable(),
            CallError::Connection { .. } => true,
            CallError::CircuitOpen { .. } => false,
        }
    }

    pub fn counts_against_backend(&self) -> bool {
        match self {
            CallError::Backend { kind, .. } => kind.counts_against_backend(),
            CallError::Connection { .. } => true,
            CallError::CircuitOpen { .. } => false,
        }
    }

    pub fn message(&self) -> String {
        match self {
            CallError::Backend { message, .. } | CallError::Connection { message } => message.clone(),
            CallError::CircuitOpen { backend } => format!("circuit breaker open for {}", backend),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip_and_accept_grpc_spellings() {
        for kind in FailureKind::ALL {
            assert_eq!(FailureKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(FailureKind::from_code("NOT_FOUND"), Some(FailureKind::NotFound));
        assert_eq!(FailureKind::from_code("InvalidArgument"), None);
        assert_eq!(FailureKind::from_code("invalid_argument"), Some(FailureKind::InvalidInput));
        assert_eq!(FailureKind::from_code("teapot"), None);
    }

    #[test]
    fn client_kinds_do_not_count_against_backend() {
        assert!(!FailureKind::InvalidInput.counts_against_backend());
        assert!(!FailureKind::NotFound.counts_against_backend());
        assert!(!FailureKind::Unauthenticated.counts_against_backend());
        assert!(FailureKind::Unavailable.counts_against_backend());
        assert!(CallError::connection("refused").counts_against_backend());
    }

    #[test]
    fn retry_classification() {
        assert!(FailureKind::FailedPrecondition.is_retryable());
        assert!(!FailureKind::Internal.is_retryable());
        assert!(CallError::connection("reset").is_retryable());
        assert!(!CallError::CircuitOpen { backend: BackendName::Chat }.is_retryable());
    }

    #[test]
    fn status_fallback() {
        assert_eq!(FailureKind::from_http_status(503), FailureKind::Unavailable);
        assert_eq!(FailureKind::from_http_status(500), FailureKind::Internal);
        assert_eq!(FailureKind::from_http_status(418), FailureKind::Unknown);
    }
}
