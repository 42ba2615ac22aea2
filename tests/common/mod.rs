//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::Path,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use university_gateway::backend::{BackendCall, BackendClient, BackendName, CallError};
use university_gateway::health::HealthStatus;
use university_gateway::{GatewayConfig, GatewayServer, Shutdown};

/// In-process backend answering from a script, then from a fallback.
pub struct ScriptedBackend {
    calls: AtomicUsize,
    script: Mutex<VecDeque<Result<Value, CallError>>>,
    fallback: Mutex<Result<Value, CallError>>,
    last_call: Mutex<Option<BackendCall>>,
    health: Mutex<HealthStatus>,
}

impl ScriptedBackend {
    pub fn ok(value: Value) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(Ok(value)),
            last_call: Mutex::new(None),
            health: Mutex::new(HealthStatus::Healthy),
        })
    }

    pub fn failing(error: CallError) -> Arc<Self> {
        let backend = Self::ok(Value::Null);
        backend.set_fallback(Err(error));
        backend
    }

    /// Queue a one-shot answer, used before the fallback.
    pub fn push(&self, result: Result<Value, CallError>) {
        self.script.lock().unwrap().push_back(result);
    }

    pub fn set_fallback(&self, result: Result<Value, CallError>) {
        *self.fallback.lock().unwrap() = result;
    }

    pub fn set_health(&self, status: HealthStatus) {
        *self.health.lock().unwrap() = status;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_call(&self) -> Option<BackendCall> {
        self.last_call.lock().unwrap().clone()
    }
}

#[async_trait]
impl BackendClient for ScriptedBackend {
    async fn invoke(&self, call: BackendCall) -> Result<Value, CallError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_call.lock().unwrap() = Some(call);
        let scripted = self.script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| self.fallback.lock().unwrap().clone())
    }

    async fn probe(&self, _timeout: Duration) -> HealthStatus {
        *self.health.lock().unwrap()
    }
}

/// One scripted backend per service, all answering `{}`.
pub struct Backends {
    pub auth: Arc<ScriptedBackend>,
    pub chat: Arc<ScriptedBackend>,
    pub employee: Arc<ScriptedBackend>,
    pub structure: Arc<ScriptedBackend>,
}

impl Backends {
    pub fn new() -> Self {
        Self {
            auth: ScriptedBackend::ok(json!({})),
            chat: ScriptedBackend::ok(json!({})),
            employee: ScriptedBackend::ok(json!({})),
            structure: ScriptedBackend::ok(json!({})),
        }
    }

    fn clients(&self) -> HashMap<BackendName, Arc<dyn BackendClient>> {
        let mut clients: HashMap<BackendName, Arc<dyn BackendClient>> = HashMap::new();
        clients.insert(BackendName::Auth, self.auth.clone());
        clients.insert(BackendName::Chat, self.chat.clone());
        clients.insert(BackendName::Employee, self.employee.clone());
        clients.insert(BackendName::Structure, self.structure.clone());
        clients
    }
}

/// Config with fast probes and short delays for tests.
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.health_check.interval_ms = 50;
    config.health_check.timeout_ms = 50;
    for name in BackendName::ALL {
        let backend = config.backends.get_mut(name);
        backend.timeout_ms = 1_000;
        backend.retry.initial_delay_ms = 5;
        backend.retry.max_delay_ms = 20;
    }
    config
}

/// A gateway running on an ephemeral port.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    handle: JoinHandle<()>,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        let _ = tokio::time::timeout(Duration::from_secs(5), self.handle).await;
    }
}

/// Start a gateway backed by `backends` and wait until `/health` is ok.
pub async fn spawn_gateway(config: GatewayConfig, backends: &Backends) -> TestGateway {
    let server = GatewayServer::with_clients(config, backends.clients()).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    let handle = tokio::spawn(async move {
        server.run(listener, rx).await.unwrap();
    });

    let gateway = TestGateway { addr, shutdown, handle };
    wait_for_status(&gateway, StatusCode::OK).await;
    gateway
}

/// Poll `/health` until it answers `status`.
pub async fn wait_for_status(gateway: &TestGateway, status: StatusCode) {
    let client = reqwest::Client::new();
    for _ in 0..100 {
        if let Ok(resp) = client.get(gateway.url("/health")).send().await {
            if resp.status().as_u16() == status.as_u16() {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("gateway /health never answered {}", status);
}

/// What the mock RPC backend saw in its last call.
#[derive(Debug, Clone, Default)]
pub struct Seen {
    pub operation: String,
    pub body: Value,
    pub request_id: Option<String>,
    pub authorization: Option<String>,
}

/// Start an HTTP backend speaking the gateway's RPC convention.
///
/// Operation `Fail` answers 404 with a wire error, `Boom` answers a bare
/// 502, `Empty` answers 204 and anything else echoes the payload.
pub async fn start_rpc_backend() -> (SocketAddr, Arc<Mutex<Seen>>) {
    let seen = Arc::new(Mutex::new(Seen::default()));
    let recorder = seen.clone();

    let app = Router::new()
        .route(
            "/rpc/{operation}",
            post(move |Path(operation): Path<String>, headers: HeaderMap, Json(body): Json<Value>| {
                let recorder = recorder.clone();
                async move {
                    let header = |name: &str| {
                        headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
                    };
                    *recorder.lock().unwrap() = Seen {
                        operation: operation.clone(),
                        body: body.clone(),
                        request_id: header("x-request-id"),
                        authorization: header("authorization"),
                    };

                    match operation.as_str() {
                        "Fail" => (
                            StatusCode::NOT_FOUND,
                            Json(json!({"code": "not-found", "message": "employee 7 not found"})),
                        )
                            .into_response(),
                        "Boom" => (StatusCode::BAD_GATEWAY, "upstream exploded").into_response(),
                        "Empty" => StatusCode::NO_CONTENT.into_response(),
                        _ => Json(json!({"echo": body})).into_response(),
                    }
                }
            }),
        )
        .route("/health", get(|| async { "ok" }));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, seen)
}
