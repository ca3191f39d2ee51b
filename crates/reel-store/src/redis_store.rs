//! Redis store backends.
//!
//! Layout (all keys prefixed, owner-namespaced):
//! - `{prefix}:job:{owner}:{id}`: job record JSON
//! - `{prefix}:lease:{owner}:{id}`: lease fencing token (PX = TTL)
//! - `{prefix}:active_jobs`: set of `{owner}/{id}` members
//! - `{prefix}:project:{owner}:{id}`: project record JSON
//!
//! The lease key is the single-writer mechanism: `SET NX PX` wins or loses
//! the claim atomically, commits verify the fencing token and re-extend the
//! TTL, and release deletes the key only when the token still matches.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use redis::AsyncCommands;
use tracing::debug;

use reel_models::{Job, JobId, Project, ProjectId};

use crate::error::{StoreError, StoreResult};
use crate::job_store::JobStore;
use crate::lease::WriteLease;
use crate::project_store::ProjectStore;

/// Redis store configuration.
#[derive(Debug, Clone)]
pub struct RedisStoreConfig {
    /// Redis URL
    pub url: String,
    /// Key prefix
    pub prefix: String,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            prefix: "reel".to_string(),
        }
    }
}

impl RedisStoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            prefix: std::env::var("REEL_KEY_PREFIX").unwrap_or_else(|_| "reel".to_string()),
        }
    }
}

const RELEASE_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
else
    return 0
end
"#;

/// Redis-backed `JobStore`.
pub struct RedisJobStore {
    client: redis::Client,
    prefix: String,
}

impl RedisJobStore {
    pub fn new(config: RedisStoreConfig) -> StoreResult<Self> {
        let client = redis::Client::open(config.url.as_str())?;
        Ok(Self {
            client,
            prefix: config.prefix,
        })
    }

    pub fn from_env() -> StoreResult<Self> {
        Self::new(RedisStoreConfig::from_env())
    }

    fn job_key(&self, owner_id: &str, job_id: &JobId) -> String {
        format!("{}:job:{}:{}", self.prefix, owner_id, job_id)
    }

    fn lease_key(&self, owner_id: &str, job_id: &JobId) -> String {
        format!("{}:lease:{}:{}", self.prefix, owner_id, job_id)
    }

    fn active_key(&self) -> String {
        format!("{}:active_jobs", self.prefix)
    }

    async fn conn(&self) -> StoreResult<redis::aio::MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }
}

#[async_trait]
impl JobStore for RedisJobStore {
    async fn create(&self, job: &Job) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        let key = self.job_key(&job.owner_id, &job.id);
        let payload = serde_json::to_string(job)?;

        let created: bool = conn.set_nx(&key, payload).await?;
        if !created {
            return Err(StoreError::already_exists(format!("job {}", job.id)));
        }

        let member = format!("{}/{}", job.owner_id, job.id);
        let _: () = conn.sadd(self.active_key(), member).await?;
        Ok(())
    }

    async fn get(&self, owner_id: &str, job_id: &JobId) -> StoreResult<Option<Job>> {
        let mut conn = self.conn().await?;
        let payload: Option<String> = conn.get(self.job_key(owner_id, job_id)).await?;
        match payload {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn try_claim(
        &self,
        owner_id: &str,
        job_id: &JobId,
        holder: &str,
        ttl: Duration,
    ) -> StoreResult<Option<WriteLease>> {
        let mut conn = self.conn().await?;

        let exists: bool = conn.exists(self.job_key(owner_id, job_id)).await?;
        if !exists {
            return Err(StoreError::not_found(format!("job {}", job_id)));
        }

        let lease = WriteLease::new(owner_id, job_id.clone(), holder, ttl);
        let claimed: Option<String> = redis::cmd("SET")
            .arg(self.lease_key(owner_id, job_id))
            .arg(&lease.token)
            .arg("NX")
            .arg("PX")
            .arg(ttl.as_millis() as u64)
            .query_async(&mut conn)
            .await?;

        if claimed.is_none() {
            debug!(job_id = %job_id, holder = %holder, "Write lease held elsewhere");
            return Ok(None);
        }
        Ok(Some(lease))
    }

    async fn commit(&self, lease: &WriteLease, job: &Job) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        let lease_key = self.lease_key(&lease.owner_id, &lease.job_id);

        // Fencing check. Single-writer is guaranteed by the lease itself, so
        // the subsequent read-check-write needs no transaction.
        let stored_token: Option<String> = conn.get(&lease_key).await?;
        if stored_token.as_deref() != Some(lease.token.as_str()) {
            return Err(StoreError::lease_expired(format!("job {}", lease.job_id)));
        }

        let job_key = self.job_key(&lease.owner_id, &lease.job_id);
        let current_json: Option<String> = conn.get(&job_key).await?;
        let current: Job = match current_json {
            Some(json) => serde_json::from_str(&json)?,
            None => return Err(StoreError::not_found(format!("job {}", lease.job_id))),
        };

        if !current.phase.can_transition(job.phase) {
            return Err(StoreError::PhaseRegression {
                from: current.phase,
                to: job.phase,
            });
        }
        if job.progress < current.progress {
            return Err(StoreError::ProgressRegression {
                from: current.progress,
                to: job.progress,
            });
        }

        let mut committed = job.clone();
        if current.cancel_requested {
            committed.cancel_requested = true;
        }
        committed.updated_at = Utc::now();

        let payload = serde_json::to_string(&committed)?;
        let _: () = conn.set(&job_key, payload).await?;

        // Renew the lease for the next step.
        let _: () = redis::cmd("PEXPIRE")
            .arg(&lease_key)
            .arg(lease.ttl.as_millis() as u64)
            .query_async(&mut conn)
            .await?;

        if committed.phase.is_terminal() {
            let member = format!("{}/{}", lease.owner_id, lease.job_id);
            let _: () = conn.srem(self.active_key(), member).await?;
        }
        Ok(())
    }

    async fn release(&self, lease: &WriteLease) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        let _: i32 = redis::Script::new(RELEASE_SCRIPT)
            .key(self.lease_key(&lease.owner_id, &lease.job_id))
            .arg(&lease.token)
            .invoke_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn request_cancel(&self, owner_id: &str, job_id: &JobId) -> StoreResult<bool> {
        let mut conn = self.conn().await?;
        let job_key = self.job_key(owner_id, job_id);
        let payload: Option<String> = conn.get(&job_key).await?;
        let mut job: Job = match payload {
            Some(json) => serde_json::from_str(&json)?,
            None => return Err(StoreError::not_found(format!("job {}", job_id))),
        };

        if job.phase.is_terminal() {
            return Ok(false);
        }

        job.cancel_requested = true;
        job.updated_at = Utc::now();
        let _: () = conn.set(&job_key, serde_json::to_string(&job)?).await?;
        Ok(true)
    }

    async fn active_jobs(&self) -> StoreResult<Vec<(String, JobId)>> {
        let mut conn = self.conn().await?;
        let members: Vec<String> = conn.smembers(self.active_key()).await?;
        Ok(members
            .iter()
            .filter_map(|member| {
                member
                    .split_once('/')
                    .map(|(owner, id)| (owner.to_string(), JobId::from_string(id)))
            })
            .collect())
    }
}

/// Redis-backed `ProjectStore`.
pub struct RedisProjectStore {
    client: redis::Client,
    prefix: String,
}

impl RedisProjectStore {
    pub fn new(config: RedisStoreConfig) -> StoreResult<Self> {
        let client = redis::Client::open(config.url.as_str())?;
        Ok(Self {
            client,
            prefix: config.prefix,
        })
    }

    pub fn from_env() -> StoreResult<Self> {
        Self::new(RedisStoreConfig::from_env())
    }

    fn project_key(&self, owner_id: &str, project_id: &ProjectId) -> String {
        format!("{}:project:{}:{}", self.prefix, owner_id, project_id)
    }
}

#[async_trait]
impl ProjectStore for RedisProjectStore {
    async fn create(&self, project: &Project) -> StoreResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = self.project_key(&project.owner_id, &project.id);
        let payload = serde_json::to_string(project)?;

        let created: bool = conn.set_nx(&key, payload).await?;
        if !created {
            return Err(StoreError::already_exists(format!(
                "project {}",
                project.id
            )));
        }
        Ok(())
    }

    async fn get(&self, owner_id: &str, project_id: &ProjectId) -> StoreResult<Option<Project>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload: Option<String> = conn.get(self.project_key(owner_id, project_id)).await?;
        match payload {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn update(&self, project: &Project) -> StoreResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = self.project_key(&project.owner_id, &project.id);

        let exists: bool = conn.exists(&key).await?;
        if !exists {
            return Err(StoreError::not_found(format!("project {}", project.id)));
        }

        let _: () = conn.set(&key, serde_json::to_string(project)?).await?;
        Ok(())
    }
}
