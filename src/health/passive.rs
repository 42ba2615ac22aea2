//! Passive health checking (failure detection).
//!
//! # Responsibilities
//! - Observe every backend call outcome
//! - Track consecutive backend-fault failures
//! - Downgrade the registry snapshot when the threshold is crossed
//!
//! # Design Decisions
//! - Only backend faults count (connection errors, unavailable, internal, ...)
//! - Client-side failures prove the backend answers and reset the counter
//! - A connection failure downgrades straight to `unavailable`
//! - Never upgrades; the probe loop is authoritative

use std::sync::Arc;

use dashmap::DashMap;

use crate::backend::{BackendName, CallOutcome};
use crate::health::registry::ServiceRegistry;
use crate::health::state::HealthStatus;

#[derive(Debug)]
pub struct PassiveHealth {
    registry: Arc<ServiceRegistry>,
    threshold: u32,
    consecutive_failures: DashMap<BackendName, u32>,
}

impl PassiveHealth {
    pub fn new(registry: Arc<ServiceRegistry>, threshold: u32) -> Self {
        Self {
            registry,
            threshold: threshold.max(1),
            consecutive_failures: DashMap::new(),
        }
    }

    pub fn observe(&self, outcome: &CallOutcome) {
        if !outcome.is_backend_fault() {
            self.consecutive_failures.insert(outcome.backend, 0);
            return;
        }

        let failures = {
            let mut count = self.consecutive_failures.entry(outcome.backend).or_insert(0);
            *count += 1;
            *count
        };

        let detail = outcome.message.clone().unwrap_or_default();
        if outcome.connection_failure {
            self.registry
                .downgrade(outcome.backend, HealthStatus::Unavailable, detail);
        } else if failures >= self.threshold {
            self.registry.downgrade(
                outcome.backend,
                HealthStatus::Degraded,
                format!("{} consecutive failed calls: {}", failures, detail),
            );
        }
    }

    pub fn consecutive_failures(&self, backend: BackendName) -> u32 {
        self.consecutive_failures.get(&backend).map(|c| *c).unwrap_or(0)
    }
}
