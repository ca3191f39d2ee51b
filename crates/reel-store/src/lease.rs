//! Write leases for single-writer discipline.

use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use reel_models::JobId;

/// Exclusive write access to one job for a bounded period.
///
/// At most one valid lease exists per job at any instant; workers that fail
/// to claim it exit quietly. Commits renew the lease, so a holder doing
/// legitimate work keeps it for as long as the job needs.
#[derive(Debug, Clone)]
pub struct WriteLease {
    pub owner_id: String,
    pub job_id: JobId,
    /// Worker identity, for diagnostics
    pub holder: String,
    /// Fencing token; commits verify it against the stored lease
    pub token: String,
    pub expires_at: DateTime<Utc>,
    /// Original TTL, used for renewal on commit
    pub ttl: Duration,
}

impl WriteLease {
    pub fn new(owner_id: impl Into<String>, job_id: JobId, holder: impl Into<String>, ttl: Duration) -> Self {
        Self {
            owner_id: owner_id.into(),
            job_id,
            holder: holder.into(),
            token: Uuid::new_v4().to_string(),
            expires_at: Utc::now() + ttl,
            ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_lease_not_expired() {
        let lease = WriteLease::new("user-1", JobId::new(), "worker-a", Duration::from_secs(60));
        assert!(!lease.is_expired());
    }

    #[test]
    fn test_zero_ttl_expires_immediately() {
        let lease = WriteLease::new("user-1", JobId::new(), "worker-a", Duration::from_secs(0));
        assert!(lease.is_expired());
    }
}
