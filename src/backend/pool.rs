//! Backend pool management.
//!
//! # Responsibilities
//! - Own, per backend, its target, circuit breaker, retrier and client
//! - Run a logical call through retrier and breaker
//! - Report every attempt to logs, metrics and passive health

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::backend::{
    BackendCall, BackendClient, BackendName, BackendTarget, CallError, CallMetadata, CallOutcome,
};
use crate::health::PassiveHealth;
use crate::observability::metrics;
use crate::resilience::{CircuitBreaker, CircuitBreakerPolicy, Deadline, Retrier, RetryPolicy};

/// One backend together with its resilience state.
pub struct ManagedBackend {
    pub target: BackendTarget,
    pub breaker: Arc<CircuitBreaker>,
    pub retrier: Retrier,
    pub client: Arc<dyn BackendClient>,
}

impl ManagedBackend {
    pub fn new(target: BackendTarget, client: Arc<dyn BackendClient>) -> Self {
        let breaker = Arc::new(CircuitBreaker::new(
            target.name,
            CircuitBreakerPolicy::from(&target.circuit_breaker),
        ));
        let retrier = Retrier::new(RetryPolicy::from(&target.retry));
        Self {
            target,
            breaker,
            retrier,
            client,
        }
    }
}

/// All backends the gateway talks to.
pub struct BackendPool {
    backends: HashMap<BackendName, ManagedBackend>,
    passive: Arc<PassiveHealth>,
}

impl BackendPool {
    pub fn new(backends: Vec<ManagedBackend>, passive: Arc<PassiveHealth>) -> Self {
        Self {
            backends: backends.into_iter().map(|b| (b.target.name, b)).collect(),
            passive,
        }
    }

    /// Perform one logical call: breaker-gated, retried, deadline-bounded.
    pub async fn call(
        &self,
        name: BackendName,
        operation: &'static str,
        payload: Value,
        deadline: Deadline,
        metadata: &CallMetadata,
    ) -> Result<Value, CallError> {
        let backend = self
            .backends
            .get(&name)
            .ok_or_else(|| CallError::connection(format!("backend {} is not configured", name)))?;

        let request_id = metadata.request_id.as_str();
        backend
            .retrier
            .execute(
                &backend.breaker,
                deadline,
                backend.target.call_timeout,
                |attempt| {
                    let call = BackendCall {
                        operation,
                        payload: payload.clone(),
                        timeout: attempt.timeout,
                        metadata: metadata.clone(),
                    };
                    backend.client.invoke(call)
                },
                |report| {
                    let outcome = match report.error {
                        None => CallOutcome::success(name, operation, report.index, report.elapsed),
                        Some(e) => CallOutcome::failure(name, operation, report.index, e, report.elapsed),
                    };
                    if let Some(e) = report.error {
                        tracing::warn!(
                            request_id = %request_id,
                            backend = %name,
                            operation = operation,
                            attempt = report.index,
                            elapsed_ms = report.elapsed.as_millis() as u64,
                            error = %e,
                            "Backend call failed"
                        );
                    } else {
                        tracing::debug!(
                            request_id = %request_id,
                            backend = %name,
                            operation = operation,
                            attempt = report.index,
                            elapsed_ms = report.elapsed.as_millis() as u64,
                            "Backend call succeeded"
                        );
                    }
                    metrics::record_backend_call(&outcome);
                    self.passive.observe(&outcome);
                },
            )
            .await
    }
}
