//! HTTP/JSON transport for backend calls.
//!
//! A call is `POST {address}/rpc/{operation}` with the payload as a JSON
//! body. Failures come back as a non-2xx answer carrying
//! `{"code": "<failure kind>", "message": "..."}`. The client is the pooled
//! hyper-util legacy client, shared by every backend.

use std::time::Duration;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{header, Method, Request, StatusCode};
use hyper::{body::Incoming, Response};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use serde::Deserialize;
use serde_json::Value;

use crate::backend::{BackendCall, BackendClient, BackendTarget, CallError, FailureKind};
use crate::health::state::HealthStatus;

/// Largest backend response body accepted.
const MAX_RESPONSE_BYTES: usize = 16 * 1024 * 1024;

pub type HttpClient = Client<HttpConnector, Body>;

/// Build the shared connection pool.
pub fn http_client() -> HttpClient {
    let mut connector = HttpConnector::new();
    connector.set_nodelay(true);
    Client::builder(TokioExecutor::new()).build(connector)
}

/// [`BackendClient`] speaking JSON over HTTP to one backend.
#[derive(Clone)]
pub struct HttpRpcClient {
    client: HttpClient,
    rpc_base: String,
    health_url: String,
}

#[derive(Debug, Deserialize)]
struct WireError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl HttpRpcClient {
    pub fn new(client: HttpClient, target: &BackendTarget, health_path: &str) -> Self {
        Self {
            client,
            rpc_base: target.endpoint("rpc"),
            health_url: target.endpoint(health_path),
        }
    }

    fn build_request(&self, call: &BackendCall) -> Result<Request<Body>, CallError> {
        let body = serde_json::to_vec(&call.payload)
            .map_err(|e| CallError::backend(FailureKind::InvalidInput, e.to_string()))?;

        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(format!("{}/{}", self.rpc_base, call.operation))
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-request-id", call.metadata.request_id.as_str())
            .header("x-trace-id", call.metadata.trace_id.as_str())
            .header("x-deadline-ms", call.timeout.as_millis().to_string());
        if let Some(auth) = &call.metadata.authorization {
            builder = builder.header(header::AUTHORIZATION, auth.as_str());
        }

        builder
            .body(Body::from(body))
            .map_err(|e| CallError::backend(FailureKind::Internal, format!("bad backend request: {}", e)))
    }
}

#[async_trait]
impl BackendClient for HttpRpcClient {
    async fn invoke(&self, call: BackendCall) -> Result<Value, CallError> {
        let request = self.build_request(&call)?;

        let response: Response<Incoming> = self.client.request(request).await.map_err(|e| {
            if e.is_connect() {
                CallError::connection(e.to_string())
            } else {
                CallError::backend(FailureKind::Unavailable, e.to_string())
            }
        })?;

        let status = response.status();
        let bytes = read_body(response.into_body()).await?;

        if status.is_success() {
            decode_success(&bytes)
        } else {
            Err(decode_failure(status, &bytes))
        }
    }

    async fn probe(&self, timeout: Duration) -> HealthStatus {
        let request = match Request::builder()
            .method(Method::GET)
            .uri(self.health_url.as_str())
            .header(header::USER_AGENT, "university-gateway-health-check")
            .body(Body::empty())
        {
            Ok(req) => req,
            Err(e) => {
                tracing::error!(url = %self.health_url, error = %e, "Failed to build health check request");
                return HealthStatus::Unavailable;
            }
        };

        match tokio::time::timeout(timeout, self.client.request(request)).await {
            Ok(Ok(response)) if response.status().is_success() => HealthStatus::Healthy,
            Ok(Ok(response)) => {
                tracing::debug!(url = %self.health_url, status = %response.status(), "Health probe: non-success status");
                HealthStatus::Degraded
            }
            Ok(Err(e)) => {
                tracing::debug!(url = %self.health_url, error = %e, "Health probe: connection error");
                HealthStatus::Unavailable
            }
            Err(_) => {
                tracing::debug!(url = %self.health_url, "Health probe: timeout");
                HealthStatus::Unavailable
            }
        }
    }
}

/// Collect a streamed backend body, bounded by [`MAX_RESPONSE_BYTES`].
async fn read_body(body: Incoming) -> Result<Bytes, CallError> {
    axum::body::to_bytes(Body::new(body), MAX_RESPONSE_BYTES)
        .await
        .map_err(|e| CallError::backend(FailureKind::Internal, format!("unreadable response body: {}", e)))
}

fn decode_success(bytes: &Bytes) -> Result<Value, CallError> {
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_slice(bytes)
        .map_err(|e| CallError::backend(FailureKind::Internal, format!("malformed backend response: {}", e)))
}

fn decode_failure(status: StatusCode, bytes: &Bytes) -> CallError {
    let wire: Option<WireError> = serde_json::from_slice(bytes).ok();
    let (code, message) = match wire {
        Some(w) => (w.code, w.message),
        None => (None, None),
    };

    let kind = code
        .as_deref()
        .and_then(FailureKind::from_code)
        .unwrap_or_else(|| FailureKind::from_http_status(status.as_u16()));
    let message = message.unwrap_or_else(|| {
        let text = String::from_utf8_lossy(bytes).trim().to_string();
        if text.is_empty() {
            status.canonical_reason().unwrap_or("backend error").to_string()
        } else {
            text
        }
    });

    CallError::backend(kind, message)
}
