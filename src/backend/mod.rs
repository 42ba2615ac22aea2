//! Backend services and how they are called.
//!
//! # Data Flow
//! ```text
//! pool.rs (ManagedBackend per service)
//!     → resilience (breaker permit, retries, timeouts)
//!     → client.rs (BackendClient trait)
//!     → transport.rs (HTTP/JSON implementation)
//!     → failure.rs (classify what went wrong)
//! ```

pub mod client;
pub mod failure;
pub mod pool;
pub mod target;
pub mod transport;

pub use client::{BackendCall, BackendClient, CallMetadata, CallOutcome};
pub use failure::{CallError, FailureKind};
pub use pool::{BackendPool, ManagedBackend};
pub use target::{BackendName, BackendTarget};
pub use transport::HttpRpcClient;
