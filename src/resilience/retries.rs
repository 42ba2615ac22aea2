//! Retry logic.
//!
//! # Responsibilities
//! - Re-attempt transient failures with exponential backoff
//! - Gate every attempt, the first included, through the circuit breaker
//! - Never outlive the request deadline
//!
//! # Design Decisions
//! - A refused permit ends the call immediately, without consuming a retry
//! - A retry is only issued if the remaining budget covers the backoff
//!   delay plus a full call timeout
//! - Attempts are sequential; dropping the future cancels the pending
//!   attempt or sleep

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::backend::CallError;
use crate::config::schema::RetryConfig;
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;
use crate::resilience::circuit_breaker::CircuitBreaker;
use crate::resilience::timeouts::{with_timeout, Deadline};

/// How a call is retried.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, the first included.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub jitter: f64,
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            multiplier: config.multiplier,
            jitter: config.jitter,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

/// Handed to the operation for each attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    /// Zero-based attempt index.
    pub index: u32,
    /// Budget of this attempt, already bounded by the deadline.
    pub timeout: Duration,
}

/// What happened in one attempt, reported to the observer.
#[derive(Debug)]
pub struct AttemptReport<'a> {
    pub index: u32,
    pub elapsed: Duration,
    pub error: Option<&'a CallError>,
}

/// Executes a logical call as a bounded series of attempts.
#[derive(Debug, Clone)]
pub struct Retrier {
    policy: RetryPolicy,
}

impl Retrier {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Run `op` until it succeeds, fails permanently, runs out of attempts or
    /// runs out of time. `observe` sees every attempt that reached the backend.
    pub async fn execute<T, F, Fut, O>(
        &self,
        breaker: &Arc<CircuitBreaker>,
        deadline: Deadline,
        call_timeout: Duration,
        mut op: F,
        mut observe: O,
    ) -> Result<T, CallError>
    where
        F: FnMut(Attempt) -> Fut,
        Fut: Future<Output = Result<T, CallError>>,
        O: FnMut(&AttemptReport<'_>),
    {
        let backend = breaker.backend();
        let mut index = 0;

        loop {
            if deadline.is_expired() {
                return Err(CallError::deadline_exceeded("request deadline exceeded"));
            }

            let permit = breaker.permit()?;
            let timeout = deadline.bound(call_timeout);
            let started = Instant::now();

            let result = with_timeout(timeout, op(Attempt { index, timeout })).await;
            permit.record(&result);
            observe(&AttemptReport {
                index,
                elapsed: started.elapsed(),
                error: result.as_ref().err(),
            });

            let error = match result {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            let next = index + 1;
            if !error.is_retryable() || next >= self.policy.max_attempts {
                return Err(error);
            }

            let delay = calculate_backoff(index, &self.policy);
            if deadline.remaining() < delay.saturating_add(call_timeout) {
                tracing::debug!(
                    backend = %backend,
                    attempt = index,
                    remaining_ms = deadline.remaining().as_millis() as u64,
                    "No budget left for another attempt"
                );
                return Err(CallError::deadline_exceeded(format!(
                    "deadline too close to retry after: {}",
                    error.message()
                )));
            }

            tracing::info!(
                backend = %backend,
                attempt = index,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retrying backend call"
            );
            metrics::record_retry(backend);
            tokio::time::sleep(delay).await;
            index = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendName, FailureKind};
    use crate::resilience::circuit_breaker::{CircuitBreakerPolicy, CircuitState};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn retrier(max_attempts: u32) -> Retrier {
        Retrier::new(RetryPolicy {
            max_attempts,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
            jitter: 0.0,
        })
    }

    fn breaker(failure_threshold: u32) -> Arc<CircuitBreaker> {
        Arc::new(CircuitBreaker::new(
            BackendName::Employee,
            CircuitBreakerPolicy {
                failure_threshold,
                ..CircuitBreakerPolicy::default()
            },
        ))
    }

    fn unavailable() -> CallError {
        CallError::backend(FailureKind::Unavailable, "down")
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_success_with_growing_delays() {
        let calls = AtomicU32::new(0);
        let mut starts = Vec::new();
        let origin = Instant::now();

        let result = retrier(4)
            .execute(
                &breaker(10),
                Deadline::after(Duration::from_secs(60)),
                Duration::from_secs(1),
                |attempt| {
                    starts.push(origin.elapsed());
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    assert_eq!(attempt.index, n);
                    async move {
                        if n < 2 {
                            Err(unavailable())
                        } else {
                            Ok("done")
                        }
                    }
                },
                |_| {},
            )
            .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            starts,
            vec![Duration::ZERO, Duration::from_millis(100), Duration::from_millis(300)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn attempts_are_bounded() {
        let calls = AtomicU32::new(0);
        let mut reports = 0;
        let result: Result<(), _> = retrier(3)
            .execute(
                &breaker(10),
                Deadline::after(Duration::from_secs(60)),
                Duration::from_secs(1),
                |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(unavailable()) }
                },
                |report| {
                    assert!(report.error.is_some());
                    reports += 1;
                },
            )
            .await;

        assert_eq!(result.unwrap_err().kind(), FailureKind::Unavailable);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(reports, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_failures_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retrier(4)
            .execute(
                &breaker(10),
                Deadline::after(Duration::from_secs(60)),
                Duration::from_secs(1),
                |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(CallError::backend(FailureKind::InvalidInput, "bad email")) }
                },
                |_| {},
            )
            .await;

        assert_eq!(result.unwrap_err().kind(), FailureKind::InvalidInput);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn open_breaker_stops_retries() {
        let cb = breaker(2);
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retrier(4)
            .execute(
                &cb,
                Deadline::after(Duration::from_secs(60)),
                Duration::from_secs(1),
                |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(unavailable()) }
                },
                |_| {},
            )
            .await;

        assert_eq!(result.unwrap_err(), CallError::CircuitOpen { backend: BackendName::Employee });
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_attempt_times_out_and_respects_deadline() {
        let calls = AtomicU32::new(0);
        let origin = Instant::now();
        let result: Result<(), _> = retrier(4)
            .execute(
                &breaker(10),
                Deadline::after(Duration::from_millis(1500)),
                Duration::from_secs(1),
                |attempt| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    assert_eq!(attempt.timeout, Duration::from_secs(1));
                    async {
                        tokio::time::sleep(Duration::from_secs(10)).await;
                        Ok(())
                    }
                },
                |_| {},
            )
            .await;

        // 1s attempt + 100ms delay + 1s timeout would overrun 1.5s.
        assert_eq!(result.unwrap_err().kind(), FailureKind::DeadlineExceeded);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(origin.elapsed() <= Duration::from_millis(1500));
    }
}
