//! Shared data models for the ReelForge backend.
//!
//! This crate provides Serde-serializable types for:
//! - Shot plans (the director's output) and their closed vocabularies
//! - Projects and provider selection
//! - Jobs and per-shot runtime state
//! - Cost estimation breakdowns

pub mod aspect;
pub mod camera;
pub mod cost;
pub mod ids;
pub mod job;
pub mod plan;
pub mod project;

// Re-export common types
pub use aspect::{AspectRatio, AspectRatioParseError};
pub use camera::{CameraMove, CameraMoveParseError, Transition, TransitionParseError};
pub use cost::CostBreakdown;
pub use ids::{JobId, ProjectId};
pub use job::{Job, JobPhase, ShotJob, ShotState};
pub use plan::{
    round_duration, Plan, Scene, Shot, MAX_SHOT_SECONDS, MIN_PROMPT_TOKENS, MIN_SHOT_SECONDS,
    TOTAL_DURATION_TOLERANCE,
};
pub use project::{
    CompileProviderConfig, ImageProviderConfig, Project, ProviderSelection, TextProviderConfig,
    VideoProviderConfig,
};
