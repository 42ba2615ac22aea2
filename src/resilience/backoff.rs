//! Exponential backoff with optional jitter.

use std::time::Duration;

use rand::Rng;

use crate::resilience::retries::RetryPolicy;

/// Delay before the retry that follows failed attempt `attempt` (zero-based).
///
/// `min(initial * multiplier^attempt, max_delay)`, then stretched by up to
/// `jitter` of itself and capped at `max_delay` again.
pub fn calculate_backoff(attempt: u32, policy: &RetryPolicy) -> Duration {
    let max = policy.max_delay.as_nanos() as f64;
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let delay = (policy.initial_delay.as_nanos() as f64 * policy.multiplier.powi(exponent)).min(max);

    let jittered = if policy.jitter > 0.0 && delay > 0.0 {
        let factor = rand::thread_rng().gen_range(0.0..=policy.jitter);
        (delay * (1.0 + factor)).min(max)
    } else {
        delay
    };

    if jittered.is_finite() && jittered > 0.0 {
        Duration::from_nanos(jittered.round() as u64)
    } else {
        Duration::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(jitter: f64) -> RetryPolicy {
        RetryPolicy {
            max_attempts: 4,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1000),
            multiplier: 2.0,
            jitter,
        }
    }

    #[test]
    fn test_backoff_calculation() {
        let p = policy(0.0);
        assert_eq!(calculate_backoff(0, &p), Duration::from_millis(100));
        assert_eq!(calculate_backoff(1, &p), Duration::from_millis(200));
        assert_eq!(calculate_backoff(3, &p), Duration::from_millis(800));
        assert_eq!(calculate_backoff(4, &p), Duration::from_millis(1000));
        assert_eq!(calculate_backoff(200, &p), Duration::from_millis(1000));
    }

    #[test]
    fn delays_never_decrease_without_jitter() {
        let p = policy(0.0);
        let delays: Vec<_> = (0..10).map(|n| calculate_backoff(n, &p)).collect();
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let p = policy(0.5);
        for _ in 0..100 {
            let d = calculate_backoff(1, &p);
            assert!(d >= Duration::from_millis(200) && d <= Duration::from_millis(300), "{:?}", d);
            assert!(calculate_backoff(8, &p) <= p.max_delay);
        }
    }
}
