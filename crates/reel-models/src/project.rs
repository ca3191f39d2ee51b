//! Project and provider selection models.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{AspectRatio, Plan, ProjectId};

/// Text completion provider configuration.
///
/// Closed tagged set: unknown providers fail deserialization at project
/// creation instead of surfacing at phase entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum TextProviderConfig {
    /// Google Gemini generateContent API
    Gemini {
        #[serde(skip_serializing_if = "Option::is_none")]
        model: Option<String>,
    },
    /// OpenRouter (OpenAI-style chat completions)
    OpenRouter {
        #[serde(skip_serializing_if = "Option::is_none")]
        model: Option<String>,
    },
    /// Scripted in-process adapter for tests and synthetic jobs
    Mock,
}

/// Image synthesis provider configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum ImageProviderConfig {
    /// REST prediction-queue endpoint (submit, then poll to completion)
    Rest {
        #[serde(skip_serializing_if = "Option::is_none")]
        endpoint: Option<String>,
    },
    /// Scripted in-process adapter for tests and synthetic jobs
    Mock,
}

/// Video synthesis provider configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum VideoProviderConfig {
    /// REST prediction-queue endpoint
    Rest {
        #[serde(skip_serializing_if = "Option::is_none")]
        endpoint: Option<String>,
        /// Whether the vendor accepts an end frame in addition to the start frame
        #[serde(default = "default_true")]
        supports_end_frame: bool,
    },
    /// Scripted in-process adapter for tests and synthetic jobs
    Mock,
}

/// Clip compilation provider configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum CompileProviderConfig {
    /// REST render-queue endpoint
    Rest {
        #[serde(skip_serializing_if = "Option::is_none")]
        endpoint: Option<String>,
    },
    /// Skip compilation; per-shot clips are the deliverable
    None,
    /// Scripted in-process adapter for tests and synthetic jobs
    Mock,
}

fn default_true() -> bool {
    true
}

impl CompileProviderConfig {
    /// Whether this selection produces a compile phase at all.
    pub fn is_enabled(&self) -> bool {
        !matches!(self, CompileProviderConfig::None)
    }
}

/// The four-provider bundle selected for a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProviderSelection {
    pub text: TextProviderConfig,
    pub image: ImageProviderConfig,
    pub video: VideoProviderConfig,
    pub compile: CompileProviderConfig,
}

impl ProviderSelection {
    /// All-mock selection with compilation disabled; used by tests and
    /// synthetic canary jobs.
    pub fn mock() -> Self {
        Self {
            text: TextProviderConfig::Mock,
            image: ImageProviderConfig::Mock,
            video: VideoProviderConfig::Mock,
            compile: CompileProviderConfig::None,
        }
    }
}

/// A user's promo video project.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Project {
    /// Unique project ID
    pub id: ProjectId,

    /// Owning user; all persisted keys are namespaced by this
    pub owner_id: String,

    /// Display name
    pub name: String,

    /// The natural-language concept to direct
    pub concept: String,

    /// Optional declared visual style
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,

    /// Requested total duration in seconds
    pub target_duration: f64,

    /// Output aspect ratio
    pub aspect_ratio: AspectRatio,

    /// Selected external providers
    pub providers: ProviderSelection,

    /// Latest directed plan, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<Plan>,

    /// Whether the current plan has been approved (frozen)
    #[serde(default)]
    pub plan_approved: bool,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// Create a new project with no plan yet.
    pub fn new(
        owner_id: impl Into<String>,
        name: impl Into<String>,
        concept: impl Into<String>,
        target_duration: f64,
        aspect_ratio: AspectRatio,
        providers: ProviderSelection,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ProjectId::new(),
            owner_id: owner_id.into(),
            name: name.into(),
            concept: concept.into(),
            style: None,
            target_duration,
            aspect_ratio,
            providers,
            plan: None,
            plan_approved: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace the plan (clears approval) and bump the update timestamp.
    pub fn set_plan(&mut self, plan: Plan) {
        self.plan = Some(plan);
        self.plan_approved = false;
        self.updated_at = Utc::now();
    }

    /// Freeze the current plan.
    pub fn approve_plan(&mut self) {
        self.plan_approved = true;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_provider_tag_rejected() {
        let json = r#"{"provider": "openrouter"}"#;
        assert!(serde_json::from_str::<TextProviderConfig>(json).is_ok());

        let json = r#"{"provider": "skynet"}"#;
        assert!(serde_json::from_str::<TextProviderConfig>(json).is_err());
    }

    #[test]
    fn test_video_end_frame_defaults_on() {
        let json = r#"{"provider": "rest"}"#;
        let cfg: VideoProviderConfig = serde_json::from_str(json).unwrap();
        match cfg {
            VideoProviderConfig::Rest {
                supports_end_frame, ..
            } => assert!(supports_end_frame),
            _ => panic!("expected rest provider"),
        }
    }

    #[test]
    fn test_compile_none_disables_phase() {
        assert!(!CompileProviderConfig::None.is_enabled());
        assert!(CompileProviderConfig::Rest { endpoint: None }.is_enabled());
    }

    #[test]
    fn test_set_plan_clears_approval() {
        let mut project = Project::new(
            "user-1",
            "Demo",
            "A drone ascent over a pine forest at dawn",
            30.0,
            AspectRatio::Landscape,
            ProviderSelection::mock(),
        );
        project.plan_approved = true;
        project.set_plan(Plan {
            title: "t".into(),
            narrative: "n".into(),
            total_duration: 0.0,
            scenes: vec![],
        });
        assert!(!project.plan_approved);
    }
}
