//! HTTP/JSON transport against a live mock backend.

mod common;

use std::time::Duration;

use serde_json::json;
use tokio::net::TcpListener;

use common::start_rpc_backend;
use university_gateway::backend::transport::http_client;
use university_gateway::backend::{
    BackendCall, BackendClient, BackendName, BackendTarget, CallError, CallMetadata, FailureKind, HttpRpcClient,
};
use university_gateway::config::{BackendConfig, HealthCheckConfig};
use university_gateway::health::HealthStatus;
use university_gateway::{GatewayServer, Shutdown};

fn client_for(address: String) -> HttpRpcClient {
    let target = BackendTarget::from_config(
        BackendName::Employee,
        &BackendConfig::with_address(address),
        &HealthCheckConfig::default(),
    )
    .unwrap();
    HttpRpcClient::new(http_client(), &target, "/health")
}

fn call(operation: &'static str) -> BackendCall {
    BackendCall {
        operation,
        payload: json!({"id": 7}),
        timeout: Duration::from_secs(2),
        metadata: CallMetadata {
            request_id: "req-77".to_string(),
            trace_id: "trace-77".to_string(),
            authorization: Some("Bearer t0k".to_string()),
        },
    }
}

#[tokio::test]
async fn success_returns_body_and_forwards_metadata() {
    let (addr, seen) = start_rpc_backend().await;
    let client = client_for(format!("http://{}", addr));

    let value = client.invoke(call("GetEmployeeByID")).await.unwrap();
    assert_eq!(value, json!({"echo": {"id": 7}}));

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen.operation, "GetEmployeeByID");
    assert_eq!(seen.request_id.as_deref(), Some("req-77"));
    assert_eq!(seen.authorization.as_deref(), Some("Bearer t0k"));
}

#[tokio::test]
async fn large_responses_are_collected_in_full() {
    let (addr, _) = start_rpc_backend().await;
    let client = client_for(format!("http://{}", addr));

    let blob = "x".repeat(512 * 1024);
    let mut big = call("GetAllEmployees");
    big.payload = json!({"blob": blob});

    let value = client.invoke(big).await.unwrap();
    assert_eq!(value["echo"]["blob"].as_str().map(str::len), Some(512 * 1024));
}

#[tokio::test]
async fn address_without_scheme_defaults_to_http() {
    let (addr, _) = start_rpc_backend().await;
    let client = client_for(addr.to_string());
    assert!(client.invoke(call("GetAllEmployees")).await.is_ok());
}

#[tokio::test]
async fn error_bodies_are_classified() {
    let (addr, _) = start_rpc_backend().await;
    let client = client_for(format!("http://{}", addr));

    let err = client.invoke(call("Fail")).await.unwrap_err();
    assert_eq!(err, CallError::backend(FailureKind::NotFound, "employee 7 not found"));

    let err = client.invoke(call("Boom")).await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::Unavailable);
    assert_eq!(err.message(), "upstream exploded");
    assert!(err.is_retryable());
}

#[tokio::test]
async fn empty_success_is_null() {
    let (addr, _) = start_rpc_backend().await;
    let client = client_for(format!("http://{}", addr));
    assert_eq!(client.invoke(call("Empty")).await.unwrap(), serde_json::Value::Null);
}

#[tokio::test]
async fn refused_connection_is_a_connection_error() {
    // Reserve a port, then free it so nothing listens there.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client_for(format!("http://{}", addr));
    let err = client.invoke(call("GetEmployeeByID")).await.unwrap_err();
    assert!(matches!(err, CallError::Connection { .. }), "{:?}", err);
    assert!(err.counts_against_backend());

    assert_eq!(client.probe(Duration::from_millis(500)).await, HealthStatus::Unavailable);
}

#[tokio::test]
async fn health_check_reports_healthy_backend() {
    let (addr, _) = start_rpc_backend().await;
    let client = client_for(format!("http://{}", addr));
    assert_eq!(client.probe(Duration::from_secs(1)).await, HealthStatus::Healthy);
}

#[tokio::test]
async fn gateway_built_from_config_reaches_http_backends() {
    let (addr, seen) = start_rpc_backend().await;
    let mut config = common::test_config();
    for name in BackendName::ALL {
        config.backends.get_mut(name).address = format!("http://{}", addr);
    }
    let server = GatewayServer::new(config).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let gateway = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    let handle = tokio::spawn(async move { server.run(listener, rx).await.unwrap() });

    let resp = reqwest::get(format!("http://{}/employees/7", gateway)).await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["echo"], json!({"id": 7}));
    assert_eq!(seen.lock().unwrap().operation, "GetEmployeeByID");

    shutdown.trigger();
    let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
}

#[tokio::test]
async fn gateway_rejects_unusable_backend_address() {
    let mut config = common::test_config();
    config.backends.chat.address = "ftp://chat-service:9092".to_string();
    assert!(GatewayServer::new(config).is_err());
}
