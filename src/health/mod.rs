//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     One timer per backend
//!     → Probe the backend
//!     → Overwrite its snapshot in registry.rs
//!
//! Passive health checks (passive.rs):
//!     Backend call outcome observed
//!     → Count consecutive backend faults
//!     → Downgrade the snapshot in registry.rs
//!
//! /health:
//!     Reads registry.rs snapshots synchronously
//! ```
//!
//! # Design Decisions
//! - Health is advisory: it never gates calls, the circuit breaker does
//! - Health state is per-backend

pub mod active;
pub mod passive;
pub mod registry;
pub mod state;

pub use active::{HealthMonitor, ProbeTarget};
pub use passive::PassiveHealth;
pub use registry::ServiceRegistry;
pub use state::{HealthSnapshot, HealthStatus};
