//! Project handlers: create, direct, refine, approve, generate.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use reel_director::{DirectRequest, Director, DirectorConstraints};
use reel_models::{
    AspectRatio, CostBreakdown, Job, JobId, Plan, Project, ProjectId, ProviderSelection,
};
use reel_providers::{Capability, CredentialStore, ProviderBundle};
use reel_store::{JobStore, ProjectStore};

use crate::auth::Owner;
use crate::error::{ApiError, ApiResult, Envelope};
use crate::state::AppState;

/// Shortest plannable video: one shot at the minimum duration.
const MIN_TARGET_SECONDS: f64 = 5.0;
const MAX_TARGET_SECONDS: f64 = 600.0;

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    pub concept: String,
    #[serde(default)]
    pub style: Option<String>,
    pub target_duration: f64,
    pub aspect_ratio: AspectRatio,
    /// Provider selection; unknown provider tags fail deserialization here,
    /// at creation time, not at phase entry.
    pub config: ProviderSelection,
}

#[derive(Debug, Deserialize, Default)]
pub struct DirectBody {
    #[serde(default)]
    pub constraints: DirectorConstraints,
}

#[derive(Debug, Deserialize)]
pub struct RefineBody {
    pub feedback: String,
    #[serde(default)]
    pub constraints: DirectorConstraints,
}

#[derive(Debug, Serialize)]
pub struct DirectResponse {
    pub plan: Plan,
    pub cost_estimate: CostBreakdown,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub job_id: JobId,
}

/// Build the owner's provider bundle from the project's selection plus
/// fresh credential lookups.
async fn bundle_for(
    state: &AppState,
    owner_id: &str,
    selection: &ProviderSelection,
) -> ApiResult<ProviderBundle> {
    let text = state.credentials.lookup(owner_id, Capability::Text).await;
    let image = state.credentials.lookup(owner_id, Capability::Image).await;
    let video = state.credentials.lookup(owner_id, Capability::Video).await;
    let compile = state
        .credentials
        .lookup(owner_id, Capability::Compile)
        .await;

    Ok(ProviderBundle::build(selection, text, image, video, compile)?)
}

async fn load_project(
    state: &AppState,
    owner_id: &str,
    project_id: &str,
) -> ApiResult<Project> {
    let project_id = ProjectId::from_string(project_id);
    state
        .projects
        .get(owner_id, &project_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Unknown project"))
}

/// POST /api/projects
pub async fn create_project(
    State(state): State<AppState>,
    owner: Owner,
    Json(body): Json<CreateProjectRequest>,
) -> ApiResult<Json<Envelope<Project>>> {
    let name = body.name.trim();
    let concept = body.concept.trim();

    if name.is_empty() {
        return Err(ApiError::bad_request("Project name must not be empty"));
    }
    if concept.is_empty() {
        return Err(ApiError::bad_request("Concept must not be empty"));
    }
    if !(MIN_TARGET_SECONDS..=MAX_TARGET_SECONDS).contains(&body.target_duration) {
        return Err(ApiError::bad_request(format!(
            "Target duration must be between {:.0} and {:.0} seconds",
            MIN_TARGET_SECONDS, MAX_TARGET_SECONDS
        )));
    }

    let mut project = Project::new(
        owner.0.clone(),
        name,
        concept,
        body.target_duration,
        body.aspect_ratio,
        body.config,
    );
    project.style = body
        .style
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    state.projects.create(&project).await?;
    info!(project_id = %project.id, owner_id = %owner.0, "Project created");

    Ok(Envelope::ok(project))
}

/// POST /api/projects/:project_id/direct
pub async fn direct_project(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    owner: Owner,
    body: Option<Json<DirectBody>>,
) -> ApiResult<Json<Envelope<DirectResponse>>> {
    let mut project = load_project(&state, owner.as_str(), &project_id).await?;

    let bundle = bundle_for(&state, owner.as_str(), &project.providers).await?;
    let director = Director::new(Arc::clone(&bundle.text));

    let constraints = body.map(|Json(b)| b.constraints).unwrap_or_default();
    let request = DirectRequest {
        concept: project.concept.clone(),
        target_duration: project.target_duration,
        aspect_ratio: project.aspect_ratio,
        style: project.style.clone(),
        constraints,
    };

    let directed = director.direct(&request).await?;
    let cost_estimate = director.estimate_cost(&directed.plan, &bundle);

    project.set_plan(directed.plan.clone());
    state.projects.update(&project).await?;

    Ok(Envelope::ok(DirectResponse {
        plan: directed.plan,
        cost_estimate,
    }))
}

/// POST /api/projects/:project_id/refine
pub async fn refine_project(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    owner: Owner,
    Json(body): Json<RefineBody>,
) -> ApiResult<Json<Envelope<DirectResponse>>> {
    if body.feedback.trim().is_empty() {
        return Err(ApiError::bad_request("Feedback must not be empty"));
    }

    let mut project = load_project(&state, owner.as_str(), &project_id).await?;
    let prior = project
        .plan
        .clone()
        .ok_or_else(|| ApiError::bad_request("Project has no plan to refine"))?;

    let bundle = bundle_for(&state, owner.as_str(), &project.providers).await?;
    let director = Director::new(Arc::clone(&bundle.text));

    let directed = director
        .refine(&prior, body.feedback.trim(), &body.constraints)
        .await?;
    let cost_estimate = director.estimate_cost(&directed.plan, &bundle);

    project.set_plan(directed.plan.clone());
    state.projects.update(&project).await?;

    Ok(Envelope::ok(DirectResponse {
        plan: directed.plan,
        cost_estimate,
    }))
}

/// POST /api/projects/:project_id/approve
pub async fn approve_project(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    owner: Owner,
) -> ApiResult<Json<Envelope<serde_json::Value>>> {
    let mut project = load_project(&state, owner.as_str(), &project_id).await?;

    if project.plan.is_none() {
        return Err(ApiError::bad_request("Project has no plan to approve"));
    }

    project.approve_plan();
    state.projects.update(&project).await?;
    info!(project_id = %project.id, "Plan approved");

    Ok(Envelope::ok(serde_json::json!({"approved": true})))
}

/// POST /api/projects/:project_id/generate
pub async fn generate_project(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    owner: Owner,
) -> ApiResult<Json<Envelope<GenerateResponse>>> {
    let project = load_project(&state, owner.as_str(), &project_id).await?;

    let plan = project
        .plan
        .clone()
        .ok_or_else(|| ApiError::bad_request("Project has no plan"))?;
    if !project.plan_approved {
        return Err(ApiError::bad_request("Plan has not been approved"));
    }

    // The job freezes everything it needs; later plan edits cannot touch it.
    let job = Job::from_plan(
        project.id.clone(),
        owner.0.clone(),
        project.aspect_ratio,
        project.providers.clone(),
        &plan,
    );
    state.jobs.create(&job).await?;
    state.orchestrator.start(owner.as_str(), &job.id);

    info!(project_id = %project.id, job_id = %job.id, "Generation started");

    Ok(Envelope::ok(GenerateResponse { job_id: job.id }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_rejects_unknown_provider_tag() {
        let json = r#"{
            "name": "Demo",
            "concept": "A drone ascent",
            "target_duration": 30,
            "aspect_ratio": "16:9",
            "config": {
                "text": {"provider": "skynet"},
                "image": {"provider": "mock"},
                "video": {"provider": "mock"},
                "compile": {"provider": "none"}
            }
        }"#;
        assert!(serde_json::from_str::<CreateProjectRequest>(json).is_err());
    }

    #[test]
    fn test_create_request_parses_full_selection() {
        let json = r#"{
            "name": "Demo",
            "concept": "A drone ascent",
            "style": "cinematic",
            "target_duration": 30,
            "aspect_ratio": "9:16",
            "config": {
                "text": {"provider": "openrouter", "model": "google/gemini-2.5-pro"},
                "image": {"provider": "rest", "endpoint": "https://img.example/v1"},
                "video": {"provider": "rest", "supports_end_frame": false},
                "compile": {"provider": "none"}
            }
        }"#;
        let parsed: CreateProjectRequest = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.aspect_ratio, AspectRatio::Portrait);
        assert_eq!(parsed.style.as_deref(), Some("cinematic"));
    }
}
