//! Response construction and error translation.
//!
//! Every failure leaves the gateway as an [`ErrorEnvelope`] with a status
//! from one static table. Success bodies that are JSON objects carry the
//! request ID as well.

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::backend::{BackendName, CallError, FailureKind};

/// Anything that can end a request with an error response.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Call(#[from] CallError),

    #[error("{0}")]
    InvalidInput(String),

    #[error("no route for {path}")]
    RouteNotFound { path: String },

    #[error("method {method} not allowed")]
    MethodNotAllowed { method: Method, allowed: Vec<Method> },
}

impl GatewayError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        GatewayError::InvalidInput(message.into())
    }
}

/// JSON body of every error response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorEnvelope {
    pub error: String,
    pub message: String,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    pub timestamp: String,
}

/// Status, stable code and client-facing message of one failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

/// HTTP status of a failure kind.
pub fn status_for_kind(kind: FailureKind) -> StatusCode {
    match kind {
        FailureKind::InvalidInput | FailureKind::FailedPrecondition | FailureKind::OutOfRange => {
            StatusCode::BAD_REQUEST
        }
        FailureKind::Unauthenticated => StatusCode::UNAUTHORIZED,
        FailureKind::PermissionDenied => StatusCode::FORBIDDEN,
        FailureKind::NotFound => StatusCode::NOT_FOUND,
        FailureKind::AlreadyExists | FailureKind::Aborted => StatusCode::CONFLICT,
        FailureKind::ResourceExhausted => StatusCode::TOO_MANY_REQUESTS,
        FailureKind::Unimplemented => StatusCode::NOT_IMPLEMENTED,
        FailureKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        FailureKind::DeadlineExceeded | FailureKind::Cancelled => StatusCode::REQUEST_TIMEOUT,
        FailureKind::Internal | FailureKind::Unknown | FailureKind::DataLoss => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn default_message(kind: FailureKind) -> &'static str {
    match kind {
        FailureKind::InvalidInput => "Invalid request",
        FailureKind::NotFound => "Resource not found",
        FailureKind::AlreadyExists => "Resource already exists",
        FailureKind::PermissionDenied => "Permission denied",
        FailureKind::ResourceExhausted => "Too many requests",
        FailureKind::FailedPrecondition => "Request cannot be performed in the current state",
        FailureKind::Unauthenticated => "Authentication required",
        FailureKind::Unavailable => "Service unavailable",
        FailureKind::DeadlineExceeded => "Request timed out",
        FailureKind::Internal | FailureKind::Unknown => "Internal server error",
        FailureKind::Unimplemented => "Not implemented",
        FailureKind::OutOfRange => "Value out of range",
        FailureKind::Aborted => "Request aborted due to a conflict",
        FailureKind::Cancelled => "Request cancelled",
        FailureKind::DataLoss => "Unrecoverable data loss",
    }
}

pub fn translate(err: &GatewayError) -> Translation {
    match err {
        GatewayError::Call(CallError::CircuitOpen { .. }) => Translation {
            status: StatusCode::SERVICE_UNAVAILABLE,
            code: "circuit_breaker_open",
            message: "Service temporarily unavailable".to_string(),
        },
        GatewayError::Call(CallError::Connection { .. }) => Translation {
            status: StatusCode::SERVICE_UNAVAILABLE,
            code: "connection_error",
            message: "Service connection failed".to_string(),
        },
        GatewayError::Call(CallError::Backend { kind, message }) => Translation {
            status: status_for_kind(*kind),
            code: kind.code(),
            message: if message.trim().is_empty() {
                default_message(*kind).to_string()
            } else {
                message.clone()
            },
        },
        GatewayError::InvalidInput(message) => Translation {
            status: StatusCode::BAD_REQUEST,
            code: FailureKind::InvalidInput.code(),
            message: message.clone(),
        },
        GatewayError::RouteNotFound { path } => Translation {
            status: StatusCode::NOT_FOUND,
            code: FailureKind::NotFound.code(),
            message: format!("No route for {}", path),
        },
        GatewayError::MethodNotAllowed { method, .. } => Translation {
            status: StatusCode::METHOD_NOT_ALLOWED,
            code: "method-not-allowed",
            message: format!("Method {} not allowed", method),
        },
    }
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Build the error response. `service` and `operation` are set when the
/// failure happened in a backend call.
pub fn error_response(
    err: &GatewayError,
    request_id: &str,
    service: Option<BackendName>,
    operation: Option<&str>,
) -> Response {
    let translation = translate(err);
    let envelope = ErrorEnvelope {
        error: translation.code.to_string(),
        message: translation.message,
        request_id: request_id.to_string(),
        service: service.map(|s| s.as_str().to_string()),
        method: operation.map(str::to_string),
        timestamp: timestamp(),
    };

    let mut response = (translation.status, Json(envelope)).into_response();
    if let GatewayError::MethodNotAllowed { allowed, .. } = err {
        let allow = allowed.iter().map(Method::as_str).collect::<Vec<_>>().join(", ");
        if let Ok(value) = HeaderValue::from_str(&allow) {
            response.headers_mut().insert(header::ALLOW, value);
        }
    }
    response
}

/// Build a success response, stamping JSON objects with the request ID.
pub fn json_response(status: StatusCode, mut body: Value, request_id: &str) -> Response {
    if let Value::Object(map) = &mut body {
        map.insert("request_id".to_string(), Value::String(request_id.to_string()));
    }
    (status, Json(body)).into_response()
}
