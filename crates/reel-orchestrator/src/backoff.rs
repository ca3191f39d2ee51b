//! Exponential backoff with jitter.
//!
//! Transient provider errors are retried by arming a wake-up timer, never
//! by sleeping inline, so the attempt counter lives in the job record and
//! the policy here only maps an attempt number to a delay.

use std::time::Duration;

use rand::Rng;

/// Exponential backoff: `base * 2^(attempt-1)`, capped, jittered ±20%.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub cap: Duration,
    /// Jitter fraction, e.g. 0.2 for ±20%
    pub jitter: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(2),
            cap: Duration::from_secs(60),
            jitter: 0.2,
        }
    }
}

impl BackoffPolicy {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self {
            base,
            cap,
            jitter: 0.2,
        }
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let doublings = attempt.saturating_sub(1).min(30);
        let raw = self.base.saturating_mul(2u32.saturating_pow(doublings));
        let capped = raw.min(self.cap);

        let factor = rand::thread_rng().gen_range(1.0 - self.jitter..=1.0 + self.jitter);
        capped.mul_f64(factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_doubles_within_jitter_bounds() {
        let policy = BackoffPolicy::default();
        for (attempt, expected_secs) in [(1u32, 2.0f64), (2, 4.0), (3, 8.0), (4, 16.0), (5, 32.0)] {
            let delay = policy.delay(attempt).as_secs_f64();
            assert!(
                delay >= expected_secs * 0.8 - 1e-9 && delay <= expected_secs * 1.2 + 1e-9,
                "attempt {}: {}s outside jitter window around {}s",
                attempt,
                delay,
                expected_secs
            );
        }
    }

    #[test]
    fn test_delay_caps_at_sixty_seconds() {
        let policy = BackoffPolicy::default();
        for attempt in [6u32, 10, 31, 100] {
            let delay = policy.delay(attempt).as_secs_f64();
            assert!(delay <= 60.0 * 1.2 + 1e-9);
            assert!(delay >= 60.0 * 0.8 - 1e-9);
        }
    }
}
