//! Job handlers: snapshot polling and cancellation.

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use tracing::info;

use reel_models::{Job, JobId};
use reel_store::JobStore;

use crate::auth::Owner;
use crate::error::{ApiError, ApiResult, Envelope};
use crate::state::AppState;

/// Per-shot summary in a job snapshot.
#[derive(Debug, Serialize)]
pub struct ShotSummary {
    pub scene_id: u32,
    pub shot_index: u32,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Read-only job snapshot.
#[derive(Debug, Serialize)]
pub struct JobSnapshot {
    pub job_id: String,
    pub project_id: String,
    pub phase: String,
    pub progress: u8,
    pub shots: Vec<ShotSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_artifact_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl JobSnapshot {
    fn from_job(job: Job) -> Self {
        Self {
            job_id: job.id.to_string(),
            project_id: job.project_id.to_string(),
            phase: job.phase.as_str().to_string(),
            progress: job.progress,
            shots: job
                .shots
                .into_iter()
                .map(|shot| ShotSummary {
                    scene_id: shot.scene_id,
                    shot_index: shot.shot_index,
                    status: shot.state.as_str().to_string(),
                    video_url: shot.video_url,
                    error: shot.error_message,
                })
                .collect(),
            final_artifact_url: job.final_artifact_url,
            error_message: job.error_message,
            created_at: job.created_at.to_rfc3339(),
            updated_at: job.updated_at.to_rfc3339(),
        }
    }
}

/// Job id format guard: ids are UUID-shaped, so anything else is rejected
/// before it reaches the store.
fn is_valid_job_id(id: &str) -> bool {
    (8..=64).contains(&id.len()) && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// GET /api/jobs/:job_id
///
/// Returns the latest committed snapshot: phase, progress, per-shot
/// status, and the final artifact URL once compiled. 404 for jobs that do
/// not exist under the requesting owner.
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    owner: Owner,
) -> ApiResult<Json<JobSnapshot>> {
    if !is_valid_job_id(&job_id) {
        return Err(ApiError::bad_request("Invalid job ID format"));
    }
    let job_id = JobId::from_string(job_id);
    let job = state
        .jobs
        .get(owner.as_str(), &job_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Unknown job"))?;

    Ok(Json(JobSnapshot::from_job(job)))
}

/// POST /api/jobs/:job_id/cancel
///
/// Sets the cancel flag; the orchestrator observes it at its next wake-up,
/// which this endpoint arms immediately.
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    owner: Owner,
) -> ApiResult<Json<Envelope<serde_json::Value>>> {
    if !is_valid_job_id(&job_id) {
        return Err(ApiError::bad_request("Invalid job ID format"));
    }
    let job_id = JobId::from_string(job_id);
    let cancelled = state.jobs.request_cancel(owner.as_str(), &job_id).await?;

    if cancelled {
        info!(job_id = %job_id, "Cancel requested");
        state.orchestrator.wake(owner.as_str(), &job_id);
    }

    Ok(Envelope::ok(serde_json::json!({"cancelled": cancelled})))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_job_ids() {
        assert!(is_valid_job_id("12345678"));
        assert!(is_valid_job_id("a1b2c3d4-e5f6-7890-abcd-ef0123456789"));
        assert!(is_valid_job_id("abc-1234-def"));
    }

    #[test]
    fn test_invalid_job_ids() {
        assert!(!is_valid_job_id(""));
        assert!(!is_valid_job_id("short"));
        assert!(!is_valid_job_id("has space"));
        assert!(!is_valid_job_id("has_underscore"));
        assert!(!is_valid_job_id("has/slash"));
        assert!(!is_valid_job_id(&"a".repeat(65)));
    }
}
