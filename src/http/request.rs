//! Request context.
//!
//! # Responsibilities
//! - Generate request IDs for requests that arrive without a usable one
//! - Build the per-request context: request ID, trace ID, deadline,
//!   authorization pass-through
//! - Echo the trace ID on the response
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing (outermost layer)
//! - The deadline is fixed once, when the request enters the gateway

use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

use crate::backend::{BackendName, CallMetadata};
use crate::http::server::AppState;
use crate::resilience::Deadline;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
pub const X_TRACE_ID: HeaderName = HeaderName::from_static("x-trace-id");

/// Fresh opaque identifier.
pub fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Request ID generator for `SetRequestIdLayer`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeGatewayRequestId;

impl MakeRequestId for MakeGatewayRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&new_id()).ok().map(RequestId::new)
    }
}

/// A header's value as trimmed, non-empty text.
fn header_text(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Runs ahead of `SetRequestIdLayer`. A blank or non-text `x-request-id` is
/// removed so a fresh one is generated, and a usable one is trimmed, leaving
/// the header as the only request ID the context, logs and response see.
pub async fn normalize_request_id(mut req: Request<Body>) -> Request<Body> {
    match header_text(req.headers(), &X_REQUEST_ID).and_then(|id| HeaderValue::from_str(&id).ok()) {
        Some(value) => {
            req.headers_mut().insert(X_REQUEST_ID, value);
        }
        None => {
            req.headers_mut().remove(X_REQUEST_ID);
        }
    }
    req
}

/// Everything a handler needs to know about the inbound request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub trace_id: String,
    pub deadline: Deadline,
    pub authorization: Option<String>,
    /// Backend and operation, once routed.
    pub target: Option<(BackendName, &'static str)>,
}

impl RequestContext {
    pub fn from_headers(headers: &HeaderMap, budget: Duration) -> Self {
        let text = |name: &HeaderName| header_text(headers, name);

        Self {
            request_id: text(&X_REQUEST_ID).unwrap_or_else(new_id),
            trace_id: text(&X_TRACE_ID).unwrap_or_else(new_id),
            deadline: Deadline::after(budget),
            authorization: text(&header::AUTHORIZATION),
            target: None,
        }
    }

    pub fn with_target(mut self, backend: BackendName, operation: &'static str) -> Self {
        self.target = Some((backend, operation));
        self
    }

    pub fn metadata(&self) -> CallMetadata {
        CallMetadata {
            request_id: self.request_id.clone(),
            trace_id: self.trace_id.clone(),
            authorization: self.authorization.clone(),
        }
    }
}

/// Attach a [`RequestContext`] to the request and echo the trace ID.
pub async fn request_context_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let ctx = RequestContext::from_headers(req.headers(), state.request_timeout);
    let trace_id = HeaderValue::from_str(&ctx.trace_id).ok();
    req.extensions_mut().insert(ctx);

    let mut response = next.run(req).await;
    if let Some(value) = trace_id {
        response.headers_mut().insert(X_TRACE_ID, value);
    }
    response
}
