//! Shared table of per-backend health snapshots.

use chrono::Utc;
use dashmap::DashMap;

use crate::backend::BackendName;
use crate::health::state::{HealthSnapshot, HealthStatus};
use crate::observability::metrics;

/// Advisory health of every backend. Never consulted for permit decisions.
#[derive(Debug)]
pub struct ServiceRegistry {
    snapshots: DashMap<BackendName, HealthSnapshot>,
}

impl ServiceRegistry {
    /// Every backend starts as `unknown`.
    pub fn new() -> Self {
        let snapshots = DashMap::new();
        for name in BackendName::ALL {
            snapshots.insert(name, HealthSnapshot::unknown(name));
        }
        Self { snapshots }
    }

    /// Overwrite a backend's snapshot with a fresh observation.
    pub fn record(&self, backend: BackendName, status: HealthStatus, detail: Option<String>) {
        let previous = self.snapshots.insert(
            backend,
            HealthSnapshot {
                backend,
                status,
                last_check: Some(Utc::now()),
                detail,
            },
        );
        self.on_change(backend, previous.map(|s| s.status), status);
    }

    /// Lower a backend's status, never raise it. Backends not yet probed keep
    /// their `unknown` status. Returns true if the snapshot changed.
    pub fn downgrade(&self, backend: BackendName, status: HealthStatus, detail: String) -> bool {
        let previous = {
            let mut entry = self
                .snapshots
                .entry(backend)
                .or_insert_with(|| HealthSnapshot::unknown(backend));
            let current = entry.status;
            let worse = matches!(
                (current, status),
                (HealthStatus::Healthy, HealthStatus::Degraded | HealthStatus::Unavailable)
                    | (HealthStatus::Degraded, HealthStatus::Unavailable)
            );
            if !worse {
                return false;
            }
            entry.status = status;
            entry.detail = Some(detail);
            current
        };
        self.on_change(backend, Some(previous), status);
        true
    }

    pub fn snapshot(&self, backend: BackendName) -> HealthSnapshot {
        self.snapshots
            .get(&backend)
            .map(|s| s.clone())
            .unwrap_or_else(|| HealthSnapshot::unknown(backend))
    }

    /// Snapshots in a stable backend order.
    pub fn snapshots(&self) -> Vec<HealthSnapshot> {
        BackendName::ALL.into_iter().map(|name| self.snapshot(name)).collect()
    }

    /// `healthy` only if every backend is healthy, `degraded` otherwise.
    pub fn overall(&self) -> HealthStatus {
        if self
            .snapshots()
            .iter()
            .all(|s| s.status == HealthStatus::Healthy)
        {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        }
    }

    fn on_change(&self, backend: BackendName, previous: Option<HealthStatus>, status: HealthStatus) {
        metrics::record_backend_health(backend, status);
        match previous {
            Some(prev) if prev == status => {}
            Some(prev) if status == HealthStatus::Healthy => {
                tracing::info!(backend = %backend, from = %prev, to = %status, "Backend health changed");
            }
            prev => {
                tracing::warn!(
                    backend = %backend,
                    from = %prev.unwrap_or(HealthStatus::Unknown),
                    to = %status,
                    "Backend health changed"
                );
            }
        }
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unknown_and_degraded_overall() {
        let registry = ServiceRegistry::new();
        let snapshots = registry.snapshots();
        assert_eq!(snapshots.len(), 4);
        assert!(snapshots.iter().all(|s| s.status == HealthStatus::Unknown && s.last_check.is_none()));
        assert_eq!(registry.overall(), HealthStatus::Degraded);
    }

    #[test]
    fn overall_healthy_only_when_all_are() {
        let registry = ServiceRegistry::new();
        for name in BackendName::ALL {
            registry.record(name, HealthStatus::Healthy, None);
        }
        assert_eq!(registry.overall(), HealthStatus::Healthy);

        registry.record(BackendName::Structure, HealthStatus::Unavailable, Some("refused".into()));
        assert_eq!(registry.overall(), HealthStatus::Degraded);
        assert!(registry.snapshot(BackendName::Structure).last_check.is_some());
    }

    #[test]
    fn downgrade_never_raises() {
        let registry = ServiceRegistry::new();
        assert!(!registry.downgrade(BackendName::Chat, HealthStatus::Degraded, "x".into()));
        assert_eq!(registry.snapshot(BackendName::Chat).status, HealthStatus::Unknown);

        registry.record(BackendName::Chat, HealthStatus::Healthy, None);
        assert!(registry.downgrade(BackendName::Chat, HealthStatus::Degraded, "errors".into()));
        assert!(!registry.downgrade(BackendName::Chat, HealthStatus::Degraded, "errors".into()));
        assert!(registry.downgrade(BackendName::Chat, HealthStatus::Unavailable, "refused".into()));
        assert_eq!(registry.snapshot(BackendName::Chat).detail.as_deref(), Some("refused"));
    }
}
