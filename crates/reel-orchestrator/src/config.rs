//! Orchestrator configuration.

use std::time::Duration;

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Orchestrator tuning knobs.
///
/// Defaults pin the tested behavior: 30s poll cadence, 40-tick video
/// ceiling (20 minutes), 60-tick compile ceiling (30 minutes), 60s per
/// external call, 5 transient retries with 2s-to-60s backoff.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Delay between poll ticks
    pub poll_interval: Duration,
    /// Video-phase poll ticks before the job times out
    pub video_poll_ceiling: u32,
    /// Compile-phase poll ticks before the job times out
    pub compile_poll_ceiling: u32,
    /// Per-external-call deadline
    pub call_deadline: Duration,
    /// Transient retries per step before the error is treated as permanent
    pub retry_budget: u32,
    /// First backoff delay
    pub backoff_base: Duration,
    /// Backoff cap
    pub backoff_cap: Duration,
    /// Write lease TTL; renewed on every commit
    pub lease_ttl: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            video_poll_ceiling: 40,
            compile_poll_ceiling: 60,
            call_deadline: Duration::from_secs(60),
            retry_budget: 5,
            backoff_base: Duration::from_secs(2),
            backoff_cap: Duration::from_secs(60),
            lease_ttl: Duration::from_secs(120),
        }
    }
}

impl OrchestratorConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            poll_interval: Duration::from_secs(env_u64("REEL_POLL_INTERVAL_SECS", 30)),
            video_poll_ceiling: env_u64("REEL_VIDEO_POLL_CEILING", 40) as u32,
            compile_poll_ceiling: env_u64("REEL_COMPILE_POLL_CEILING", 60) as u32,
            call_deadline: Duration::from_secs(env_u64("REEL_CALL_DEADLINE_SECS", 60)),
            retry_budget: env_u64("REEL_RETRY_BUDGET", 5) as u32,
            backoff_base: Duration::from_secs(env_u64("REEL_BACKOFF_BASE_SECS", 2)),
            backoff_cap: Duration::from_secs(env_u64("REEL_BACKOFF_CAP_SECS", 60)),
            lease_ttl: Duration::from_secs(env_u64("REEL_LEASE_TTL_SECS", 120)),
        }
    }

    /// Millisecond-scale delays for tests.
    pub fn fast() -> Self {
        Self {
            poll_interval: Duration::from_millis(5),
            backoff_base: Duration::from_millis(2),
            backoff_cap: Duration::from_millis(10),
            call_deadline: Duration::from_secs(5),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_declared_ceilings() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(30));
        assert_eq!(config.video_poll_ceiling, 40);
        assert_eq!(config.compile_poll_ceiling, 60);
        assert_eq!(config.retry_budget, 5);
    }
}
