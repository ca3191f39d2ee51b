//! The director: direct, refine, and price a plan.

use std::sync::Arc;

use tracing::{debug, info};

use reel_models::{AspectRatio, CostBreakdown, Plan};
use reel_providers::{ChatOptions, ProviderBundle, TextCompletion};

use crate::error::DirectorResult;
use crate::normalize::normalize;
use crate::parse::parse_plan;
use crate::prompt;
use crate::validate::{validate, DirectorConstraints};

/// Fixed token estimate used for upfront cost disclosure.
const COST_ESTIMATE_INPUT_TOKENS: u32 = 2000;
const COST_ESTIMATE_OUTPUT_TOKENS: u32 = 2000;

/// An initial direction request.
#[derive(Debug, Clone)]
pub struct DirectRequest {
    pub concept: String,
    pub target_duration: f64,
    pub aspect_ratio: AspectRatio,
    pub style: Option<String>,
    pub constraints: DirectorConstraints,
}

/// A directed plan plus the token usage the model reported.
#[derive(Debug, Clone)]
pub struct DirectedPlan {
    pub plan: Plan,
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
}

/// Shot-plan synthesis against a text completion adapter.
pub struct Director {
    text: Arc<dyn TextCompletion>,
}

impl Director {
    pub fn new(text: Arc<dyn TextCompletion>) -> Self {
        Self { text }
    }

    fn chat_options() -> ChatOptions {
        ChatOptions {
            json_output: true,
            temperature: Some(0.7),
            max_output_tokens: Some(8192),
        }
    }

    /// Produce a validated, normalized plan for a concept.
    ///
    /// Validation failures are not retried here; the caller decides whether
    /// to re-invoke. Retryable provider errors bubble unchanged.
    pub async fn direct(&self, request: &DirectRequest) -> DirectorResult<DirectedPlan> {
        let system = prompt::system_prompt();
        let user = prompt::user_prompt(request);

        info!(
            target_duration = request.target_duration,
            aspect_ratio = %request.aspect_ratio,
            "Directing concept"
        );

        let output = self
            .text
            .chat(&system, &user, &Self::chat_options())
            .await?;

        debug!(
            input_tokens = ?output.input_tokens,
            output_tokens = ?output.output_tokens,
            "Model responded"
        );

        let raw = parse_plan(&output.content)?;
        validate(&raw, request.target_duration, &request.constraints)?;
        let plan = normalize(raw);

        info!(
            scenes = plan.scenes.len(),
            shots = plan.shot_count(),
            total_duration = plan.total_duration,
            "Plan validated"
        );

        Ok(DirectedPlan {
            plan,
            input_tokens: output.input_tokens,
            output_tokens: output.output_tokens,
        })
    }

    /// Refine an existing plan with user feedback.
    ///
    /// The prior plan's total duration becomes the ±10% target, so feedback
    /// can re-pace shots without being pinned to the original request.
    pub async fn refine(
        &self,
        prior: &Plan,
        feedback: &str,
        constraints: &DirectorConstraints,
    ) -> DirectorResult<DirectedPlan> {
        let prior_json = serde_json::to_string_pretty(prior)?;
        let system = prompt::system_prompt();
        let user = prompt::refine_user_prompt(&prior_json, prior, feedback);

        info!(prior_total = prior.total_duration, "Refining plan");

        let output = self
            .text
            .chat(&system, &user, &Self::chat_options())
            .await?;

        let raw = parse_plan(&output.content)?;
        validate(&raw, prior.total_duration, constraints)?;
        let plan = normalize(raw);

        Ok(DirectedPlan {
            plan,
            input_tokens: output.input_tokens,
            output_tokens: output.output_tokens,
        })
    }

    /// Price a plan against a provider bundle: two frames and one clip per
    /// shot, an optional compile, and a fixed text allowance.
    pub fn estimate_cost(&self, plan: &Plan, bundle: &ProviderBundle) -> CostBreakdown {
        let shot_count = plan.shot_count() as u32;
        let image_count = 2 * shot_count;

        let images = image_count as f64 * bundle.image.estimate_cost();
        let videos: f64 = plan
            .shots()
            .map(|(_, shot)| bundle.video.estimate_cost(shot.duration))
            .sum();
        let compile = bundle
            .compile
            .as_ref()
            .map(|c| c.estimate_cost(shot_count))
            .unwrap_or(0.0);
        let text = bundle
            .text
            .estimate_cost(COST_ESTIMATE_INPUT_TOKENS, COST_ESTIMATE_OUTPUT_TOKENS);

        CostBreakdown {
            text,
            images,
            videos,
            compile,
            total: 0.0,
            image_count,
            video_count: shot_count,
        }
        .finalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DirectorError, ValidationKind};
    use reel_providers::{MockText, ProviderError};

    fn request() -> DirectRequest {
        DirectRequest {
            concept: "A drone ascent over a pine forest at dawn".to_string(),
            target_duration: 30.0,
            aspect_ratio: AspectRatio::Landscape,
            style: None,
            constraints: DirectorConstraints::default(),
        }
    }

    fn director_with(mock: MockText) -> Director {
        Director::new(Arc::new(mock))
    }

    #[tokio::test]
    async fn test_direct_happy_path() {
        let director = director_with(MockText::new());
        let directed = director.direct(&request()).await.unwrap();

        assert_eq!(directed.plan.shot_count(), 4);
        assert!((27.0..=33.0).contains(&directed.plan.total_duration));
        assert_eq!(directed.input_tokens, Some(2000));
    }

    #[tokio::test]
    async fn test_direct_rejects_bad_camera_move() {
        let bad = MockText::default_plan_json().replace("push_in", "zoom_through");
        let director = director_with(MockText::returning(bad));

        let err = director.direct(&request()).await.unwrap_err();
        match err {
            DirectorError::Validation(v) => {
                assert_eq!(v.kind, ValidationKind::UnknownCameraMove);
                assert_eq!(v.scene, Some(1));
                assert_eq!(v.shot, Some(1));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_direct_rejects_non_json() {
        let director = director_with(MockText::returning("Sure! Here is your plan."));
        let err = director.direct(&request()).await.unwrap_err();
        match err {
            DirectorError::Validation(v) => assert_eq!(v.kind, ValidationKind::Malformed),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_direct_rejects_duration_out_of_tolerance() {
        // The canned plan sums to 30s; a 60s target puts it under -10%
        let director = director_with(MockText::new());
        let mut req = request();
        req.target_duration = 60.0;

        let err = director.direct(&req).await.unwrap_err();
        match err {
            DirectorError::Validation(v) => {
                assert_eq!(v.kind, ValidationKind::TotalDurationOutOfTolerance)
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_provider_error_bubbles_unchanged() {
        let mock = MockText::new();
        mock.push_response(Err(ProviderError::http(503, "unavailable")));
        let director = director_with(mock);

        let err = director.direct(&request()).await.unwrap_err();
        match err {
            DirectorError::Provider(p) => assert!(p.is_retryable()),
            other => panic!("expected provider error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_refine_targets_prior_total() {
        let director = director_with(MockText::new());
        let prior = director.direct(&request()).await.unwrap().plan;

        // The mock returns the same 30s plan; refinement validates against
        // the prior 30s total and passes.
        let refined = director
            .refine(&prior, "make it moodier", &DirectorConstraints::default())
            .await
            .unwrap();
        assert_eq!(refined.plan.total_duration, prior.total_duration);
    }

    #[test]
    fn test_estimate_cost_counts_units() {
        let director = director_with(MockText::new());
        let bundle = ProviderBundle::mock();

        let plan = {
            let raw = crate::parse::parse_plan(&MockText::default_plan_json()).unwrap();
            crate::normalize::normalize(raw)
        };

        let breakdown = director.estimate_cost(&plan, &bundle);
        assert_eq!(breakdown.image_count, 8);
        assert_eq!(breakdown.video_count, 4);
        assert!(breakdown.images > 0.0);
        assert!(breakdown.videos > 0.0);
        assert_eq!(breakdown.compile, 0.0);
        let sum = breakdown.text + breakdown.images + breakdown.videos + breakdown.compile;
        assert!((breakdown.total - sum).abs() < 1e-9);
    }
}
