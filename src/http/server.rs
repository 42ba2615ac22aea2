//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the backend pool, health registry and route table from config
//! - Wire up middleware (request ID, tracing, CORS, request context)
//! - Bind server to listener and serve until shutdown
//! - Run the health monitor alongside the server

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Method, Request},
    middleware::{from_fn_with_state, map_request},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::backend::target::AddressError;
use crate::backend::transport::http_client;
use crate::backend::{BackendClient, BackendName, BackendPool, BackendTarget, HttpRpcClient, ManagedBackend};
use crate::config::GatewayConfig;
use crate::health::{HealthMonitor, PassiveHealth, ProbeTarget, ServiceRegistry};
use crate::http::dispatch::dispatch;
use crate::http::endpoints::{route_table, Handler};
use crate::http::request::{
    normalize_request_id, request_context_middleware, MakeGatewayRequestId, X_REQUEST_ID, X_TRACE_ID,
};
use crate::routing::RouteTable;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<RouteTable<Handler>>,
    pub pool: Arc<BackendPool>,
    pub registry: Arc<ServiceRegistry>,
    pub request_timeout: Duration,
    pub max_body_bytes: usize,
}

/// The gateway's HTTP server.
pub struct GatewayServer {
    router: Router,
    monitor: HealthMonitor,
}

impl GatewayServer {
    /// Create a server talking HTTP/JSON to the configured backends.
    pub fn new(config: GatewayConfig) -> Result<Self, AddressError> {
        let client = http_client();
        let health_path = config.health_check.path.clone();
        Self::assemble(config, |target| {
            Some(Arc::new(HttpRpcClient::new(client.clone(), target, &health_path)) as Arc<dyn BackendClient>)
        })
    }

    /// Create a server with caller-supplied backend clients. Backends without
    /// a client are treated as unreachable.
    pub fn with_clients(
        config: GatewayConfig,
        mut clients: HashMap<BackendName, Arc<dyn BackendClient>>,
    ) -> Result<Self, AddressError> {
        Self::assemble(config, |target| clients.remove(&target.name))
    }

    /// Resolve each backend target once and pair it with the client
    /// `client_for` hands out.
    fn assemble<F>(config: GatewayConfig, mut client_for: F) -> Result<Self, AddressError>
    where
        F: FnMut(&BackendTarget) -> Option<Arc<dyn BackendClient>>,
    {
        let registry = Arc::new(ServiceRegistry::new());
        let passive = Arc::new(PassiveHealth::new(
            registry.clone(),
            config.health_check.passive_failure_threshold,
        ));

        let mut managed = Vec::new();
        let mut probes = Vec::new();
        for name in BackendName::ALL {
            let target = BackendTarget::from_config(name, config.backends.get(name), &config.health_check)?;
            let Some(client) = client_for(&target) else {
                tracing::warn!(backend = %name, "No client for backend; calls will fail");
                continue;
            };
            tracing::info!(
                backend = %name,
                address = %target.address,
                timeout_ms = target.call_timeout.as_millis() as u64,
                max_attempts = target.retry.max_attempts,
                "Backend configured"
            );
            probes.push(ProbeTarget {
                backend: name,
                interval: target.health_interval,
                client: client.clone(),
            });
            managed.push(ManagedBackend::new(target, client));
        }

        let state = AppState {
            routes: Arc::new(route_table()),
            pool: Arc::new(BackendPool::new(managed, passive)),
            registry: registry.clone(),
            request_timeout: Duration::from_millis(config.server.request_timeout_ms),
            max_body_bytes: config.server.max_body_bytes,
        };
        let monitor = HealthMonitor::new(registry, config.health_check, probes);
        let router = Self::build_router(state);

        Ok(Self { router, monitor })
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Outermost first: request ID normalization and generation, trace, CORS,
    /// request context, dispatch.
    fn build_router(state: AppState) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, X_REQUEST_ID, X_TRACE_ID])
            .expose_headers([X_REQUEST_ID, X_TRACE_ID]);

        let trace = TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
            let request_id = req
                .headers()
                .get(&X_REQUEST_ID)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-");
            tracing::info_span!(
                "request",
                method = %req.method(),
                path = %req.uri().path(),
                request_id = %request_id,
            )
        });

        Router::new()
            .fallback(dispatch)
            .layer(from_fn_with_state(state.clone(), request_context_middleware))
            .layer(
                ServiceBuilder::new()
                    .layer(map_request(normalize_request_id))
                    .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeGatewayRequestId))
                    .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
                    .layer(trace)
                    .layer(cors),
            )
            .with_state(state)
    }

    /// Run the server until a shutdown signal arrives on `shutdown`.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let monitor = tokio::spawn(self.monitor.run(shutdown.resubscribe()));

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        if let Err(e) = monitor.await {
            tracing::error!(error = %e, "Health monitor task failed");
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
