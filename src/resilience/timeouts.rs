//! Timeout enforcement.
//!
//! # Responsibilities
//! - Carry the request's overall deadline, fixed once at request entry
//! - Bound each backend attempt by `min(call timeout, remaining budget)`
//!
//! # Design Decisions
//! - Uses Tokio's clock so tests can run with a paused clock
//! - Timed-out attempts become `deadline-exceeded`, returned as 408

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::backend::CallError;

/// Roughly 30 years, the same horizon Tokio uses for "never".
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Point in time by which a request must be answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// Deadline `budget` from now. Budgets past the clock's range saturate
    /// to a far-future instant.
    pub fn after(budget: Duration) -> Self {
        let now = Instant::now();
        Self {
            at: now.checked_add(budget).unwrap_or_else(|| now + FAR_FUTURE),
        }
    }

    /// Time left; zero once passed.
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Clamp a per-call timeout to what is left of the request.
    pub fn bound(&self, timeout: Duration) -> Duration {
        timeout.min(self.remaining())
    }
}

/// Run `fut` for at most `limit`, mapping expiry to `deadline-exceeded`.
pub async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T, CallError>
where
    F: Future<Output = Result<T, CallError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(CallError::deadline_exceeded(format!(
            "call timed out after {}ms",
            limit.as_millis()
        ))),
    }
}
