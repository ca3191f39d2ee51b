//! The job store contract.

use std::time::Duration;

use async_trait::async_trait;

use reel_models::{Job, JobId};

use crate::error::StoreResult;
use crate::lease::WriteLease;

/// Durable per-job state keyed by `(owner_id, job_id)`.
///
/// Two guarantees:
/// - **Single-writer**: at most one worker holds the write lease for a job;
///   everyone else sees read-only snapshots.
/// - **Atomic commit**: the whole job record advances in one step; partial
///   updates are never observable, phase and progress never regress.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a new job. Fails with `AlreadyExists` on id collision.
    async fn create(&self, job: &Job) -> StoreResult<()>;

    /// Read-only snapshot of the latest committed state. Returns `None`
    /// when the job does not exist under this owner.
    async fn get(&self, owner_id: &str, job_id: &JobId) -> StoreResult<Option<Job>>;

    /// Try to acquire the write lease. Returns `None` when another worker
    /// holds a live lease; the caller must then exit quietly.
    async fn try_claim(
        &self,
        owner_id: &str,
        job_id: &JobId,
        holder: &str,
        ttl: Duration,
    ) -> StoreResult<Option<WriteLease>>;

    /// Atomically replace the job record. Verifies the lease is still the
    /// current one, rejects phase and progress regressions, preserves a
    /// cancel flag set since the holder's last read, and renews the lease.
    async fn commit(&self, lease: &WriteLease, job: &Job) -> StoreResult<()>;

    /// Give the lease back early. A lease that already expired or was
    /// replaced is ignored.
    async fn release(&self, lease: &WriteLease) -> StoreResult<()>;

    /// Set the cancel flag on a non-terminal job, bypassing the lease (a
    /// single-field write observed at the holder's next wake-up). Returns
    /// whether the flag was set.
    async fn request_cancel(&self, owner_id: &str, job_id: &JobId) -> StoreResult<bool>;

    /// All non-terminal jobs, for the startup recovery sweep.
    async fn active_jobs(&self) -> StoreResult<Vec<(String, JobId)>>;
}
