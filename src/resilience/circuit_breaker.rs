//! Circuit breaker for backend protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: backend assumed down, calls fail fast
//! - Half-Open: a bounded number of trial calls test recovery
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count >= failure_threshold within interval
//! Open → Half-Open: first permit request after open_timeout
//! Half-Open → Closed: success_threshold trial calls succeed
//! Half-Open → Open: any trial call fails
//! ```
//!
//! # Design Decisions
//! - One breaker per backend, never shared
//! - A permit is taken before every attempt and settled exactly once
//! - Every transition bumps a generation; outcomes of permits issued in an
//!   earlier generation are ignored
//! - A permit dropped unsettled frees its half-open slot without counting

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::backend::{BackendName, CallError};
use crate::config::schema::CircuitBreakerConfig;
use crate::observability::metrics;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }

    /// Gauge value: 0 closed, 1 half-open, 2 open.
    pub fn gauge_value(self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::HalfOpen => 1.0,
            CircuitState::Open => 2.0,
        }
    }
}

/// Tuning of one breaker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerPolicy {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub max_half_open_requests: u32,
    pub interval: Duration,
    pub open_timeout: Duration,
}

impl From<&CircuitBreakerConfig> for CircuitBreakerPolicy {
    fn from(config: &CircuitBreakerConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold.max(1),
            success_threshold: config.success_threshold.max(1),
            max_half_open_requests: config.max_half_open_requests.max(1),
            interval: Duration::from_millis(config.interval_ms),
            open_timeout: Duration::from_millis(config.open_timeout_ms),
        }
    }
}

impl Default for CircuitBreakerPolicy {
    fn default() -> Self {
        Self::from(&CircuitBreakerConfig::default())
    }
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    generation: u64,
    failures: u32,
    window_start: Instant,
    half_open_in_flight: u32,
    half_open_successes: u32,
    changed_at: Instant,
}

/// Per-backend circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    backend: BackendName,
    policy: CircuitBreakerPolicy,
    inner: Mutex<Inner>,
}

type Transition = (CircuitState, CircuitState);

impl CircuitBreaker {
    pub fn new(backend: BackendName, policy: CircuitBreakerPolicy) -> Self {
        let now = Instant::now();
        Self {
            backend,
            policy,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                generation: 0,
                failures: 0,
                window_start: now,
                half_open_in_flight: 0,
                half_open_successes: 0,
                changed_at: now,
            }),
        }
    }

    pub fn backend(&self) -> BackendName {
        self.backend
    }

    /// Current state as last transitioned. An expired Open state is only
    /// left on the next [`permit`](Self::permit) call.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Ask to perform one call.
    ///
    /// Fails with [`CallError::CircuitOpen`] while open, or while half-open
    /// with every trial slot taken.
    pub fn permit(self: &Arc<Self>) -> Result<CallPermit, CallError> {
        let mut transition = None;
        let granted = {
            let mut inner = self.lock();
            let now = Instant::now();

            if inner.state == CircuitState::Open
                && now.saturating_duration_since(inner.changed_at) >= self.policy.open_timeout
            {
                transition = Some(Self::move_to(&mut inner, CircuitState::HalfOpen, now));
            }

            let state = inner.state;
            match state {
                CircuitState::Closed => Some((inner.generation, false)),
                CircuitState::HalfOpen if inner.half_open_in_flight < self.policy.max_half_open_requests => {
                    inner.half_open_in_flight += 1;
                    Some((inner.generation, true))
                }
                CircuitState::HalfOpen | CircuitState::Open => None,
            }
        };

        self.announce(transition);

        match granted {
            Some((generation, trial)) => Ok(CallPermit {
                breaker: Arc::clone(self),
                generation,
                trial,
                settled: false,
            }),
            None => Err(CallError::CircuitOpen {
                backend: self.backend,
            }),
        }
    }

    fn on_success(&self, generation: u64, trial: bool) {
        let mut transition = None;
        {
            let mut inner = self.lock();
            if inner.generation != generation {
                return;
            }
            let state = inner.state;
            match state {
                CircuitState::Closed => inner.failures = 0,
                CircuitState::HalfOpen => {
                    if trial {
                        inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
                    }
                    inner.half_open_successes += 1;
                    if inner.half_open_successes >= self.policy.success_threshold {
                        transition = Some(Self::move_to(&mut inner, CircuitState::Closed, Instant::now()));
                    }
                }
                CircuitState::Open => {}
            }
        }
        self.announce(transition);
    }

    fn on_failure(&self, generation: u64) {
        let mut transition = None;
        {
            let mut inner = self.lock();
            if inner.generation != generation {
                return;
            }
            let now = Instant::now();
            let state = inner.state;
            match state {
                CircuitState::Closed => {
                    if now.saturating_duration_since(inner.window_start) >= self.policy.interval {
                        inner.failures = 0;
                        inner.window_start = now;
                    }
                    inner.failures += 1;
                    if inner.failures >= self.policy.failure_threshold {
                        transition = Some(Self::move_to(&mut inner, CircuitState::Open, now));
                    }
                }
                CircuitState::HalfOpen => {
                    transition = Some(Self::move_to(&mut inner, CircuitState::Open, now));
                }
                CircuitState::Open => {}
            }
        }
        self.announce(transition);
    }

    fn release(&self, generation: u64, trial: bool) {
        let mut inner = self.lock();
        if trial && inner.generation == generation {
            inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
        }
    }

    fn move_to(inner: &mut Inner, to: CircuitState, now: Instant) -> Transition {
        let from = inner.state;
        inner.state = to;
        inner.generation = inner.generation.wrapping_add(1);
        inner.failures = 0;
        inner.window_start = now;
        inner.half_open_in_flight = 0;
        inner.half_open_successes = 0;
        inner.changed_at = now;
        (from, to)
    }

    fn announce(&self, transition: Option<Transition>) {
        let Some((from, to)) = transition else {
            return;
        };
        match to {
            CircuitState::Open => tracing::warn!(
                backend = %self.backend,
                from = from.as_str(),
                to = to.as_str(),
                open_timeout_ms = self.policy.open_timeout.as_millis() as u64,
                "Circuit breaker opened"
            ),
            _ => tracing::info!(
                backend = %self.backend,
                from = from.as_str(),
                to = to.as_str(),
                "Circuit breaker state change"
            ),
        }
        metrics::record_circuit_state(self.backend, to);
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Permission to perform one call. Settle it with the call's result.
#[derive(Debug)]
pub struct CallPermit {
    breaker: Arc<CircuitBreaker>,
    generation: u64,
    trial: bool,
    settled: bool,
}

impl CallPermit {
    pub fn record_success(mut self) {
        self.settled = true;
        self.breaker.on_success(self.generation, self.trial);
    }

    pub fn record_failure(mut self) {
        self.settled = true;
        self.breaker.on_failure(self.generation);
    }

    /// Settle with a call result. Errors that do not reflect on the
    /// backend's health count as successes.
    pub fn record<T>(self, result: &Result<T, CallError>) {
        match result {
            Err(e) if e.counts_against_backend() => self.record_failure(),
            _ => self.record_success(),
        }
    }

    /// True for a half-open trial call.
    pub fn is_trial(&self) -> bool {
        self.trial
    }
}

impl Drop for CallPermit {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.release(self.generation, self.trial);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::FailureKind;

    fn breaker(failures: u32, successes: u32, half_open: u32) -> Arc<CircuitBreaker> {
        Arc::new(CircuitBreaker::new(
            BackendName::Chat,
            CircuitBreakerPolicy {
                failure_threshold: failures,
                success_threshold: successes,
                max_half_open_requests: half_open,
                interval: Duration::from_secs(60),
                open_timeout: Duration::from_secs(30),
            },
        ))
    }

    fn fail(cb: &Arc<CircuitBreaker>) {
        cb.permit().unwrap().record_failure();
    }

    #[tokio::test(start_paused = true)]
    async fn trips_after_threshold_and_fails_fast() {
        let cb = breaker(5, 1, 1);
        for _ in 0..4 {
            fail(&cb);
            assert_eq!(cb.state(), CircuitState::Closed);
        }
        fail(&cb);
        assert_eq!(cb.state(), CircuitState::Open);

        let err = cb.permit().unwrap_err();
        assert_eq!(err, CallError::CircuitOpen { backend: BackendName::Chat });
    }

    #[tokio::test(start_paused = true)]
    async fn success_resets_consecutive_failures() {
        let cb = breaker(3, 1, 1);
        fail(&cb);
        fail(&cb);
        cb.permit().unwrap().record_success();
        fail(&cb);
        fail(&cb);
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_window_restarts_after_interval() {
        let cb = breaker(3, 1, 1);
        fail(&cb);
        fail(&cb);
        tokio::time::advance(Duration::from_secs(61)).await;
        fail(&cb);
        assert_eq!(cb.state(), CircuitState::Closed);
        fail(&cb);
        fail(&cb);
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_through_half_open() {
        let cb = breaker(1, 2, 1);
        fail(&cb);
        tokio::time::advance(Duration::from_secs(29)).await;
        assert!(cb.permit().is_err());

        tokio::time::advance(Duration::from_secs(1)).await;
        let trial = cb.permit().unwrap();
        assert!(trial.is_trial());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        // The only slot is taken.
        assert!(cb.permit().is_err());

        trial.record_success();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        cb.permit().unwrap().record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn trial_failure_reopens_and_restarts_timer() {
        let cb = breaker(1, 1, 1);
        fail(&cb);
        tokio::time::advance(Duration::from_secs(30)).await;
        cb.permit().unwrap().record_failure();
        assert_eq!(cb.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_secs(20)).await;
        assert!(cb.permit().is_err());
        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(cb.permit().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_trial_frees_its_slot() {
        let cb = breaker(1, 1, 1);
        fail(&cb);
        tokio::time::advance(Duration::from_secs(30)).await;
        drop(cb.permit().unwrap());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(cb.permit().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_outcomes_are_ignored() {
        let cb = breaker(2, 1, 1);
        let slow = cb.permit().unwrap();
        fail(&cb);
        fail(&cb);
        assert_eq!(cb.state(), CircuitState::Open);

        // Issued while closed; must not touch the open breaker.
        slow.record_success();
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn client_errors_count_as_success() {
        let cb = breaker(1, 1, 1);
        let result: Result<(), CallError> = Err(CallError::backend(FailureKind::NotFound, "nope"));
        cb.permit().unwrap().record(&result);
        assert_eq!(cb.state(), CircuitState::Closed);

        let result: Result<(), CallError> = Err(CallError::connection("refused"));
        cb.permit().unwrap().record(&result);
        assert_eq!(cb.state(), CircuitState::Open);
    }
}
