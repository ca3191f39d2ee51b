//! In-memory store backends for tests and development.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use reel_models::{Job, JobId, Project, ProjectId};

use crate::error::{StoreError, StoreResult};
use crate::job_store::JobStore;
use crate::lease::WriteLease;
use crate::project_store::ProjectStore;

#[derive(Debug, Clone)]
struct StoredLease {
    token: String,
    expires_at: DateTime<Utc>,
}

struct JobEntry {
    job: Job,
    lease: Option<StoredLease>,
}

/// In-memory `JobStore` with the same lease and commit semantics as the
/// Redis backend.
#[derive(Default)]
pub struct MemoryJobStore {
    entries: RwLock<HashMap<(String, String), JobEntry>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(owner_id: &str, job_id: &JobId) -> (String, String) {
        (owner_id.to_string(), job_id.as_str().to_string())
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, job: &Job) -> StoreResult<()> {
        let mut entries = self.entries.write().await;
        let key = Self::key(&job.owner_id, &job.id);
        if entries.contains_key(&key) {
            return Err(StoreError::already_exists(format!("job {}", job.id)));
        }
        entries.insert(
            key,
            JobEntry {
                job: job.clone(),
                lease: None,
            },
        );
        Ok(())
    }

    async fn get(&self, owner_id: &str, job_id: &JobId) -> StoreResult<Option<Job>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(&Self::key(owner_id, job_id))
            .map(|e| e.job.clone()))
    }

    async fn try_claim(
        &self,
        owner_id: &str,
        job_id: &JobId,
        holder: &str,
        ttl: Duration,
    ) -> StoreResult<Option<WriteLease>> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(&Self::key(owner_id, job_id))
            .ok_or_else(|| StoreError::not_found(format!("job {}", job_id)))?;

        if let Some(existing) = &entry.lease {
            if Utc::now() < existing.expires_at {
                return Ok(None);
            }
        }

        let lease = WriteLease::new(owner_id, job_id.clone(), holder, ttl);
        entry.lease = Some(StoredLease {
            token: lease.token.clone(),
            expires_at: lease.expires_at,
        });
        Ok(Some(lease))
    }

    async fn commit(&self, lease: &WriteLease, job: &Job) -> StoreResult<()> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(&Self::key(&lease.owner_id, &lease.job_id))
            .ok_or_else(|| StoreError::not_found(format!("job {}", lease.job_id)))?;

        let stored = entry
            .lease
            .as_ref()
            .ok_or_else(|| StoreError::lease_expired(format!("job {}", lease.job_id)))?;
        if stored.token != lease.token {
            return Err(StoreError::lease_expired(format!("job {}", lease.job_id)));
        }
        if Utc::now() >= stored.expires_at {
            return Err(StoreError::lease_expired(format!("job {}", lease.job_id)));
        }

        if !entry.job.phase.can_transition(job.phase) {
            return Err(StoreError::PhaseRegression {
                from: entry.job.phase,
                to: job.phase,
            });
        }
        if job.progress < entry.job.progress {
            return Err(StoreError::ProgressRegression {
                from: entry.job.progress,
                to: job.progress,
            });
        }

        let mut committed = job.clone();
        // A cancel can land between the holder's read and this commit; it
        // must survive the whole-record replace.
        if entry.job.cancel_requested {
            committed.cancel_requested = true;
        }

        entry.job = committed;
        entry.lease = Some(StoredLease {
            token: lease.token.clone(),
            expires_at: Utc::now() + lease.ttl,
        });
        Ok(())
    }

    async fn release(&self, lease: &WriteLease) -> StoreResult<()> {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(&Self::key(&lease.owner_id, &lease.job_id)) {
            if let Some(stored) = &entry.lease {
                if stored.token == lease.token {
                    entry.lease = None;
                }
            }
        }
        Ok(())
    }

    async fn request_cancel(&self, owner_id: &str, job_id: &JobId) -> StoreResult<bool> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(&Self::key(owner_id, job_id))
            .ok_or_else(|| StoreError::not_found(format!("job {}", job_id)))?;
        if entry.job.phase.is_terminal() {
            return Ok(false);
        }
        entry.job.cancel_requested = true;
        entry.job.updated_at = Utc::now();
        Ok(true)
    }

    async fn active_jobs(&self) -> StoreResult<Vec<(String, JobId)>> {
        let entries = self.entries.read().await;
        Ok(entries
            .values()
            .filter(|e| !e.job.phase.is_terminal())
            .map(|e| (e.job.owner_id.clone(), e.job.id.clone()))
            .collect())
    }
}

/// In-memory `ProjectStore`.
#[derive(Default)]
pub struct MemoryProjectStore {
    entries: RwLock<HashMap<(String, String), Project>>,
}

impl MemoryProjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(owner_id: &str, project_id: &ProjectId) -> (String, String) {
        (owner_id.to_string(), project_id.as_str().to_string())
    }
}

#[async_trait]
impl ProjectStore for MemoryProjectStore {
    async fn create(&self, project: &Project) -> StoreResult<()> {
        let mut entries = self.entries.write().await;
        let key = Self::key(&project.owner_id, &project.id);
        if entries.contains_key(&key) {
            return Err(StoreError::already_exists(format!("project {}", project.id)));
        }
        entries.insert(key, project.clone());
        Ok(())
    }

    async fn get(&self, owner_id: &str, project_id: &ProjectId) -> StoreResult<Option<Project>> {
        let entries = self.entries.read().await;
        Ok(entries.get(&Self::key(owner_id, project_id)).cloned())
    }

    async fn update(&self, project: &Project) -> StoreResult<()> {
        let mut entries = self.entries.write().await;
        let key = Self::key(&project.owner_id, &project.id);
        if !entries.contains_key(&key) {
            return Err(StoreError::not_found(format!("project {}", project.id)));
        }
        entries.insert(key, project.clone());
        Ok(())
    }
}
