//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe each backend on its own interval
//! - Overwrite the backend's registry snapshot with the result

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use crate::backend::{BackendClient, BackendName};
use crate::config::schema::HealthCheckConfig;
use crate::health::registry::ServiceRegistry;
use crate::health::state::HealthStatus;

/// One backend to probe.
pub struct ProbeTarget {
    pub backend: BackendName,
    pub interval: Duration,
    pub client: Arc<dyn BackendClient>,
}

pub struct HealthMonitor {
    registry: Arc<ServiceRegistry>,
    config: HealthCheckConfig,
    targets: Vec<ProbeTarget>,
}

impl HealthMonitor {
    pub fn new(registry: Arc<ServiceRegistry>, config: HealthCheckConfig, targets: Vec<ProbeTarget>) -> Self {
        Self {
            registry,
            config,
            targets,
        }
    }

    /// Run every probe loop until shutdown is broadcast.
    pub async fn run(self, shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Active health checks disabled");
            return;
        }

        tracing::info!(
            backends = self.targets.len(),
            path = %self.config.path,
            "Health monitor starting"
        );

        let timeout = Duration::from_millis(self.config.timeout_ms);
        let loops = self.targets.into_iter().map(|target| {
            probe_loop(self.registry.clone(), target, timeout, shutdown.resubscribe())
        });
        join_all(loops).await;

        tracing::info!("Health monitor stopped");
    }
}

async fn probe_loop(
    registry: Arc<ServiceRegistry>,
    target: ProbeTarget,
    timeout: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = time::interval(target.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                check_once(&registry, &target, timeout).await;
            }
            _ = shutdown.recv() => {
                tracing::debug!(backend = %target.backend, "Probe loop received shutdown signal, exiting loop");
                break;
            }
        }
    }
}

/// Probe one backend and record the result.
pub async fn check_once(registry: &ServiceRegistry, target: &ProbeTarget, timeout: Duration) -> HealthStatus {
    let status = target.client.probe(timeout).await;
    let detail = match status {
        HealthStatus::Healthy => None,
        HealthStatus::Degraded => Some("health endpoint answered with an error".to_string()),
        HealthStatus::Unavailable => Some("health endpoint unreachable".to_string()),
        HealthStatus::Unknown => Some("no probe result".to_string()),
    };
    if status != HealthStatus::Healthy {
        tracing::warn!(backend = %target.backend, status = %status, "Health check failed");
    }
    registry.record(target.backend, status, detail);
    status
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendCall, CallError};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Flaky {
        probes: AtomicU32,
    }

    #[async_trait]
    impl BackendClient for Flaky {
        async fn invoke(&self, _call: BackendCall) -> Result<Value, CallError> {
            Ok(Value::Null)
        }

        async fn probe(&self, _timeout: Duration) -> HealthStatus {
            if self.probes.fetch_add(1, Ordering::SeqCst) == 0 {
                HealthStatus::Healthy
            } else {
                HealthStatus::Unavailable
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn checks_on_interval_until_shutdown() {
        let registry = Arc::new(ServiceRegistry::new());
        let client = Arc::new(Flaky {
            probes: AtomicU32::new(0),
        });
        let monitor = HealthMonitor::new(
            registry.clone(),
            HealthCheckConfig::default(),
            vec![ProbeTarget {
                backend: BackendName::Employee,
                interval: Duration::from_secs(5),
                client: client.clone(),
            }],
        );
        let (tx, rx) = broadcast::channel(1);
        let handle = tokio::spawn(monitor.run(rx));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(registry.snapshot(BackendName::Employee).status, HealthStatus::Healthy);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(registry.snapshot(BackendName::Employee).status, HealthStatus::Unavailable);
        // Backends without a probe target stay unknown.
        assert_eq!(registry.snapshot(BackendName::Chat).status, HealthStatus::Unknown);

        tx.send(()).unwrap();
        handle.await.unwrap();
        assert_eq!(client.probes.load(Ordering::SeqCst), 2);
    }
}
