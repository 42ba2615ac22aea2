//! Request dispatch: route lookup, input validation, backend call, response shaping.

use std::time::Instant;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{Request, StatusCode},
    response::Response,
};
use serde_json::{Map, Number, Value};

use crate::backend::{CallError, FailureKind};
use crate::health::HealthStatus;
use crate::http::endpoints::{BodyRule, Endpoint, Handler, ResponseShape};
use crate::http::request::RequestContext;
use crate::http::response::{error_response, json_response, translate, GatewayError};
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::routing::{PathParams, RouteMatch};

const DEFAULT_PAGE: u64 = 1;
const DEFAULT_LIMIT: u64 = 10;
const DEFAULT_SORT_BY: &str = "created_at";
const DEFAULT_SORT_ORDER: &str = "desc";

/// Fallback handler serving every path.
pub async fn dispatch(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let ctx = request
        .extensions()
        .get::<RequestContext>()
        .cloned()
        .unwrap_or_else(|| RequestContext::from_headers(request.headers(), state.request_timeout));

    let (response, route_label) = match state.routes.lookup(&method, &path) {
        RouteMatch::NotFound => {
            tracing::debug!(request_id = %ctx.request_id, method = %method, path = %path, "No route matched");
            let err = GatewayError::RouteNotFound { path: path.clone() };
            (error_response(&err, &ctx.request_id, None, None), "unmatched")
        }
        RouteMatch::MethodNotAllowed(allowed) => {
            let err = GatewayError::MethodNotAllowed {
                method: method.clone(),
                allowed,
            };
            (error_response(&err, &ctx.request_id, None, None), "unmatched")
        }
        RouteMatch::Matched { route, params } => {
            let response = match &route.handler {
                Handler::Health => health(&state, &ctx),
                Handler::Backend(endpoint) => call_endpoint(&state, ctx, endpoint, params, request).await,
            };
            (response, route.pattern.as_str())
        }
    };

    metrics::record_request(method.as_str(), route_label, response.status().as_u16(), start);
    response
}

/// `GET /health`: aggregate of the registry snapshots, no probing.
fn health(state: &AppState, ctx: &RequestContext) -> Response {
    let healthy = state.registry.overall() == HealthStatus::Healthy;
    let snapshots = state.registry.snapshots();

    let services: Map<String, Value> = snapshots
        .iter()
        .map(|s| (s.backend.as_str().to_string(), Value::String(s.status.as_str().to_string())))
        .collect();
    let body = serde_json::json!({
        "status": if healthy { "ok" } else { "degraded" },
        "services": services,
    });

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    json_response(status, body, &ctx.request_id)
}

async fn call_endpoint(
    state: &AppState,
    ctx: RequestContext,
    endpoint: &Endpoint,
    params: PathParams,
    request: Request<Body>,
) -> Response {
    let ctx = ctx.with_target(endpoint.backend, endpoint.operation);

    match run_endpoint(state, &ctx, endpoint, params, request).await {
        Ok(response) => response,
        Err(err) => {
            let status = translate(&err).status;
            if status.is_server_error() {
                tracing::error!(
                    request_id = %ctx.request_id,
                    backend = %endpoint.backend,
                    operation = endpoint.operation,
                    status = status.as_u16(),
                    error = %err,
                    "Request failed"
                );
            } else {
                tracing::info!(
                    request_id = %ctx.request_id,
                    backend = %endpoint.backend,
                    operation = endpoint.operation,
                    status = status.as_u16(),
                    error = %err,
                    "Request rejected"
                );
            }
            error_response(&err, &ctx.request_id, Some(endpoint.backend), Some(endpoint.operation))
        }
    }
}

async fn run_endpoint(
    state: &AppState,
    ctx: &RequestContext,
    endpoint: &Endpoint,
    params: PathParams,
    request: Request<Body>,
) -> Result<Response, GatewayError> {
    let query = request.uri().query().map(str::to_string);
    let body = match endpoint.body {
        BodyRule::None => None,
        BodyRule::Optional | BodyRule::Required => Some(
            axum::body::to_bytes(request.into_body(), state.max_body_bytes)
                .await
                .map_err(|_| GatewayError::invalid_input("Request body too large or unreadable"))?,
        ),
    };

    let payload = build_payload(endpoint, &params, query.as_deref(), body.as_ref())?;

    let value = state
        .pool
        .call(endpoint.backend, endpoint.operation, payload, ctx.deadline, &ctx.metadata())
        .await?;

    let value = reject_in_band(endpoint, value)?;
    Ok(json_response(endpoint.success, shape(endpoint.shape, value), &ctx.request_id))
}

/// Merge body, query string and path parameters into the backend payload.
/// Later sources win: body, then query, then path.
pub fn build_payload(
    endpoint: &Endpoint,
    params: &PathParams,
    query: Option<&str>,
    body: Option<&Bytes>,
) -> Result<Value, GatewayError> {
    let mut payload = parse_body(endpoint.body, body)?;

    let pairs: Vec<(String, String)> = query
        .map(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect()
        })
        .unwrap_or_default();
    let lookup = |name: &str| {
        pairs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.trim())
            .filter(|v| !v.is_empty())
    };

    for required in endpoint.required_query {
        if lookup(required).is_none() {
            return Err(GatewayError::invalid_input(format!(
                "Query parameter '{}' is required",
                required
            )));
        }
    }

    for (key, value) in &pairs {
        payload.insert(key.clone(), Value::String(value.clone()));
    }

    if endpoint.paginated {
        let positive = |name: &str, default: u64| {
            lookup(name)
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|n| *n > 0)
                .unwrap_or(default)
        };
        let sort_order = match lookup("sort_order").map(str::to_ascii_lowercase).as_deref() {
            Some("asc") => "asc",
            _ => DEFAULT_SORT_ORDER,
        };
        payload.insert("page".into(), Value::Number(Number::from(positive("page", DEFAULT_PAGE))));
        payload.insert("limit".into(), Value::Number(Number::from(positive("limit", DEFAULT_LIMIT))));
        payload.insert(
            "sort_by".into(),
            Value::String(lookup("sort_by").unwrap_or(DEFAULT_SORT_BY).to_string()),
        );
        payload.insert("sort_order".into(), Value::String(sort_order.to_string()));
    }

    for (name, raw) in params.iter() {
        let id: i64 = raw.parse().map_err(|_| {
            GatewayError::invalid_input(format!("Invalid {}: '{}' is not a numeric ID", name, raw))
        })?;
        payload.insert(name.to_string(), Value::Number(Number::from(id)));
    }

    Ok(Value::Object(payload))
}

fn parse_body(rule: BodyRule, body: Option<&Bytes>) -> Result<Map<String, Value>, GatewayError> {
    let bytes = match (rule, body) {
        (BodyRule::None, _) => return Ok(Map::new()),
        (_, Some(bytes)) if !bytes.iter().all(u8::is_ascii_whitespace) => bytes,
        (BodyRule::Optional, _) => return Ok(Map::new()),
        (BodyRule::Required, _) => return Err(GatewayError::invalid_input("Request body is required")),
    };

    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(GatewayError::invalid_input("Request body must be a JSON object")),
        Err(_) => Err(GatewayError::invalid_input("Invalid JSON format")),
    }
}

/// Turn a success payload carrying a non-empty `"error"` string into a failure.
pub fn reject_in_band(endpoint: &Endpoint, value: Value) -> Result<Value, CallError> {
    let message = match value.get("error") {
        Some(Value::String(msg)) if !msg.trim().is_empty() => msg.clone(),
        _ => return Ok(value),
    };
    let kind = if message.to_ascii_lowercase().contains("not found") {
        FailureKind::NotFound
    } else {
        endpoint.rejection
    };
    Err(CallError::backend(kind, message))
}

/// Reshape a success payload for the client.
pub fn shape(shape: ResponseShape, mut value: Value) -> Value {
    if let Value::Object(map) = &mut value {
        let blank_error = match map.get("error") {
            Some(Value::Null) => true,
            Some(Value::String(s)) => s.is_empty(),
            _ => false,
        };
        if blank_error {
            map.remove("error");
        }
        if shape == ResponseShape::FlattenAuth {
            for nested in ["tokens", "user"] {
                if let Some(Value::Object(inner)) = map.remove(nested) {
                    for (key, field) in inner {
                        map.entry(key).or_insert(field);
                    }
                }
            }
        }
    }
    value
}
