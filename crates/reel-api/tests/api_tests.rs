//! API integration tests against the in-memory stores and mock providers.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use reel_api::{create_router, ApiConfig, AppState};
use reel_orchestrator::{
    CredentialAdapterFactory, Orchestrator, OrchestratorConfig, Scheduler,
};
use reel_providers::{CredentialStore, InMemoryCredentialStore};
use reel_store::{JobStore, MemoryJobStore, MemoryProjectStore, ProjectStore};

const OWNER: &str = "user-1";

/// Test state: memory stores, empty credential store, mock providers, and
/// a fast-ticking orchestrator runtime.
fn test_state() -> AppState {
    let projects: Arc<dyn ProjectStore> = Arc::new(MemoryProjectStore::new());
    let jobs: Arc<dyn JobStore> = Arc::new(MemoryJobStore::new());
    let credentials: Arc<dyn CredentialStore> = Arc::new(InMemoryCredentialStore::new());

    let (scheduler, wakeups) = Scheduler::new();
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&jobs),
        Arc::new(CredentialAdapterFactory::new(Arc::clone(&credentials))),
        scheduler,
        OrchestratorConfig::fast(),
    ));
    Arc::clone(&orchestrator).spawn_runtime(wakeups);

    // Polling loops in these tests are far faster than a real client; give
    // the per-owner limiter room.
    let config = ApiConfig {
        rate_limit_rps: 1000,
        ..ApiConfig::default()
    };

    AppState {
        config,
        projects,
        jobs,
        credentials,
        orchestrator,
    }
}

fn app() -> axum::Router {
    create_router(test_state())
}

fn post_json(uri: &str, owner: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(owner) = owner {
        builder = builder.header("x-owner-id", owner);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, owner: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(owner) = owner {
        builder = builder.header("x-owner-id", owner);
    }
    builder.body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn mock_project_body(target_duration: f64) -> Value {
    json!({
        "name": "Demo",
        "concept": "A drone ascent over a pine forest at dawn",
        "target_duration": target_duration,
        "aspect_ratio": "16:9",
        "config": {
            "text": {"provider": "mock"},
            "image": {"provider": "mock"},
            "video": {"provider": "mock"},
            "compile": {"provider": "none"}
        }
    })
}

/// Create a project, returning its id.
async fn create_project(app: &axum::Router, owner: &str) -> String {
    let response = app
        .clone()
        .oneshot(post_json("/api/projects", Some(owner), mock_project_body(30.0)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    body["data"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_endpoint() {
    let response = app()
        .oneshot(get("/health", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_missing_owner_header_is_401() {
    let response = app()
        .oneshot(post_json("/api/projects", None, mock_project_body(30.0)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("X-Owner-Id"));
}

#[tokio::test]
async fn test_empty_concept_is_400() {
    let mut body = mock_project_body(30.0);
    body["concept"] = json!("   ");

    let response = app()
        .oneshot(post_json("/api/projects", Some(OWNER), body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_project_is_404() {
    let response = app()
        .oneshot(post_json(
            "/api/projects/does-not-exist/direct",
            Some(OWNER),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_generate_requires_approval() {
    let app = app();
    let project_id = create_project(&app, OWNER).await;

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/projects/{}/generate", project_id),
            Some(OWNER),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_direct_returns_plan_and_cost() {
    let app = app();
    let project_id = create_project(&app, OWNER).await;

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/projects/{}/direct", project_id),
            Some(OWNER),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], true);

    let plan = &body["data"]["plan"];
    let total = plan["total_duration"].as_f64().unwrap();
    assert!((27.0..=33.0).contains(&total));

    let estimate = &body["data"]["cost_estimate"];
    assert_eq!(estimate["image_count"], 8);
    assert_eq!(estimate["video_count"], 4);
    assert!(estimate["total"].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn test_full_flow_direct_approve_generate_poll() {
    let app = app();
    let project_id = create_project(&app, OWNER).await;

    // Direct
    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/projects/{}/direct", project_id),
            Some(OWNER),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Approve
    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/projects/{}/approve", project_id),
            Some(OWNER),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Generate
    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/projects/{}/generate", project_id),
            Some(OWNER),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let job_id = body["data"]["job_id"].as_str().unwrap().to_string();

    // Poll until terminal
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let response = app
            .clone()
            .oneshot(get(&format!("/api/jobs/{}", job_id), Some(OWNER)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let snapshot = body_json(response).await;

        let phase = snapshot["phase"].as_str().unwrap().to_string();
        if phase == "complete" || phase == "failed" {
            assert_eq!(phase, "complete");
            assert_eq!(snapshot["progress"], 100);
            assert!(snapshot.get("final_artifact_url").is_none());
            let shots = snapshot["shots"].as_array().unwrap();
            assert_eq!(shots.len(), 4);
            for shot in shots {
                assert_eq!(shot["status"], "complete");
                assert!(shot["video_url"].as_str().is_some());
            }
            break;
        }

        assert!(
            tokio::time::Instant::now() < deadline,
            "job did not finish in time (phase {})",
            phase
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn test_owner_isolation_on_jobs() {
    let app = app();
    let project_id = create_project(&app, OWNER).await;

    for path in ["direct", "approve", "generate"] {
        let response = app
            .clone()
            .oneshot(post_json(
                &format!("/api/projects/{}/{}", project_id, path),
                Some(OWNER),
                json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "step {} failed", path);
        if path == "generate" {
            let body = body_json(response).await;
            let job_id = body["data"]["job_id"].as_str().unwrap();

            // Another owner can neither read nor cancel the job.
            let response = app
                .clone()
                .oneshot(get(&format!("/api/jobs/{}", job_id), Some("user-2")))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND);

            let response = app
                .clone()
                .oneshot(post_json(
                    &format!("/api/jobs/{}/cancel", job_id),
                    Some("user-2"),
                    json!({}),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
        }
    }

    // The other owner also cannot see the project itself.
    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/projects/{}/direct", project_id),
            Some("user-2"),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cancel_endpoint() {
    let app = app();
    let project_id = create_project(&app, OWNER).await;

    for path in ["direct", "approve", "generate"] {
        let response = app
            .clone()
            .oneshot(post_json(
                &format!("/api/projects/{}/{}", project_id, path),
                Some(OWNER),
                json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        if path == "generate" {
            let body = body_json(response).await;
            let job_id = body["data"]["job_id"].as_str().unwrap().to_string();

            let response = app
                .clone()
                .oneshot(post_json(
                    &format!("/api/jobs/{}/cancel", job_id),
                    Some(OWNER),
                    json!({}),
                ))
                .await
                .unwrap();
            let status = response.status();
            let body = body_json(response).await;
            // The job may already have completed on the fast test clock;
            // either way the envelope reports what happened.
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["success"], true);
            assert!(body["data"]["cancelled"].is_boolean());
        }
    }
}
