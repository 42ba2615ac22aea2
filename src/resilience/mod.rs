//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Backend call:
//!     → retries.rs (attempt loop, bounded by max_attempts and the deadline)
//!         → circuit_breaker.rs (permit before every attempt)
//!         → timeouts.rs (min(call timeout, remaining budget))
//!         → backoff.rs (delay before the next attempt)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every backend call has a deadline
//! - Only transient failure kinds are retried
//! - Circuit breaker prevents cascading failures, one per backend

pub mod backoff;
pub mod circuit_breaker;
pub mod retries;
pub mod timeouts;

pub use circuit_breaker::{CallPermit, CircuitBreaker, CircuitBreakerPolicy, CircuitState};
pub use retries::{Attempt, Retrier, RetryPolicy};
pub use timeouts::Deadline;
