//! Durable job records for the generation pipeline.
//!
//! A `Job` is created atomically when a plan is approved and started. It is
//! mutated only by the orchestrator holding its write lease, carries frozen
//! copies of every prompt it needs (so later plan edits cannot corrupt an
//! in-flight job), and never contains credential material.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{AspectRatio, JobId, Plan, ProjectId, ProviderSelection};

/// Coarse state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    /// Created, not yet picked up
    #[default]
    Pending,
    /// Synthesizing start/end frames per shot
    GeneratingImages,
    /// Every remaining shot has both frames
    ImagesComplete,
    /// Submitting and polling video synthesis
    GeneratingVideos,
    /// Every shot's video reached a terminal state
    VideosComplete,
    /// Waiting on the remote compile job
    Compiling,
    /// Terminal: pipeline finished
    Complete,
    /// Terminal: pipeline failed
    Failed,
}

impl JobPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobPhase::Pending => "pending",
            JobPhase::GeneratingImages => "generating_images",
            JobPhase::ImagesComplete => "images_complete",
            JobPhase::GeneratingVideos => "generating_videos",
            JobPhase::VideosComplete => "videos_complete",
            JobPhase::Compiling => "compiling",
            JobPhase::Complete => "complete",
            JobPhase::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobPhase::Complete | JobPhase::Failed)
    }

    /// Position in the forward pipeline ordering (terminals last).
    fn rank(&self) -> u8 {
        match self {
            JobPhase::Pending => 0,
            JobPhase::GeneratingImages => 1,
            JobPhase::ImagesComplete => 2,
            JobPhase::GeneratingVideos => 3,
            JobPhase::VideosComplete => 4,
            JobPhase::Compiling => 5,
            JobPhase::Complete => 6,
            JobPhase::Failed => 7,
        }
    }

    /// Whether a commit may move a job from `self` to `next`.
    ///
    /// Phases are monotonic: forward moves only, any non-terminal phase may
    /// fail, terminal phases never change.
    pub fn can_transition(&self, next: JobPhase) -> bool {
        if *self == next {
            return true;
        }
        if self.is_terminal() {
            return false;
        }
        if next == JobPhase::Failed {
            return true;
        }
        next.rank() > self.rank()
    }
}

impl std::fmt::Display for JobPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-shot runtime state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ShotState {
    /// Waiting for the next phase to pick it up
    #[default]
    Pending,
    /// Start frame being synthesized
    GeneratingStart,
    /// End frame being synthesized
    GeneratingEnd,
    /// Video request being submitted
    SubmittingVideo,
    /// Video request in the remote queue
    PollingVideo,
    /// Terminal: clip produced
    Complete,
    /// Terminal: shot abandoned
    Failed,
}

impl ShotState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShotState::Pending => "pending",
            ShotState::GeneratingStart => "generating_start",
            ShotState::GeneratingEnd => "generating_end",
            ShotState::SubmittingVideo => "submitting_video",
            ShotState::PollingVideo => "polling_video",
            ShotState::Complete => "complete",
            ShotState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ShotState::Complete | ShotState::Failed)
    }
}

/// A single shot's slice of the job record.
///
/// Prompts are frozen copies taken at approval time; resume never consults
/// the plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ShotJob {
    /// Scene the shot belongs to (1-based)
    pub scene_id: u32,

    /// Shot position within the scene (1-based)
    pub shot_index: u32,

    /// Clip duration in seconds
    pub duration: f64,

    /// Frozen start-frame prompt
    pub start_prompt: String,

    /// Frozen end-frame prompt
    pub end_prompt: String,

    /// Frozen motion prompt
    pub motion_prompt: String,

    /// Frozen outgoing transition, consumed by the compile phase
    #[serde(default)]
    pub transition_out: crate::Transition,

    /// Current state
    #[serde(default)]
    pub state: ShotState,

    /// Start frame URL once synthesized
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_image_url: Option<String>,

    /// End frame URL once synthesized
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_image_url: Option<String>,

    /// Remote video request handle, recorded before polling begins
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_request_handle: Option<String>,

    /// Final clip URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,

    /// Failure detail when state = failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Transient-retry attempts consumed by the current step
    #[serde(default)]
    pub retry_attempts: u32,
}

impl ShotJob {
    /// Whether both frames exist, making the shot eligible for video synthesis.
    pub fn has_both_images(&self) -> bool {
        self.start_image_url.is_some() && self.end_image_url.is_some()
    }

    /// Mark the shot failed with a message.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.state = ShotState::Failed;
        self.error_message = Some(message.into());
    }
}

/// A durable instance of running a plan through the generation pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,

    /// Project the job was started from
    pub project_id: ProjectId,

    /// Owning user
    pub owner_id: String,

    /// Output aspect ratio
    pub aspect_ratio: AspectRatio,

    /// Frozen provider selection; adapters are rebuilt from these tags plus
    /// a fresh credential lookup at each phase entry
    pub providers: ProviderSelection,

    /// Whether a compile phase runs after videos complete
    pub compile_enabled: bool,

    /// Current phase
    #[serde(default)]
    pub phase: JobPhase,

    /// Progress percentage (0-100)
    #[serde(default)]
    pub progress: u8,

    /// Per-shot records in scene-then-shot order
    pub shots: Vec<ShotJob>,

    /// Compiled video URL, set only by a successful compile phase
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_artifact_url: Option<String>,

    /// Failure detail, set iff phase = failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Poll ticks consumed by the video phase
    #[serde(default)]
    pub poll_attempts: u32,

    /// Remote compile request handle
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compile_request_id: Option<String>,

    /// Poll ticks consumed by the compile phase
    #[serde(default)]
    pub compile_poll_attempts: u32,

    /// Transient retries consumed by compile submission
    #[serde(default)]
    pub compile_submit_attempts: u32,

    /// Set by the owner; observed at the next wake-up
    #[serde(default)]
    pub cancel_requested: bool,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Build a job from an approved plan, freezing every prompt.
    pub fn from_plan(
        project_id: ProjectId,
        owner_id: impl Into<String>,
        aspect_ratio: AspectRatio,
        providers: ProviderSelection,
        plan: &Plan,
    ) -> Self {
        let shots = plan
            .shots()
            .map(|(scene, shot)| ShotJob {
                scene_id: scene.id,
                shot_index: shot.id,
                duration: shot.duration,
                start_prompt: shot.start_prompt.clone(),
                end_prompt: shot.end_prompt.clone(),
                motion_prompt: shot.motion_prompt.clone(),
                transition_out: shot.transition_out,
                state: ShotState::Pending,
                start_image_url: None,
                end_image_url: None,
                video_request_handle: None,
                video_url: None,
                error_message: None,
                retry_attempts: 0,
            })
            .collect();

        let compile_enabled = providers.compile.is_enabled();
        let now = Utc::now();

        Self {
            id: JobId::new(),
            project_id,
            owner_id: owner_id.into(),
            aspect_ratio,
            providers,
            compile_enabled,
            phase: JobPhase::Pending,
            progress: 0,
            shots,
            final_artifact_url: None,
            error_message: None,
            poll_attempts: 0,
            compile_request_id: None,
            compile_poll_attempts: 0,
            compile_submit_attempts: 0,
            cancel_requested: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to a new phase and bump the update timestamp.
    pub fn set_phase(&mut self, phase: JobPhase) {
        self.phase = phase;
        self.updated_at = Utc::now();
    }

    /// Mark the job complete; progress is forced to 100.
    pub fn complete(&mut self) {
        self.phase = JobPhase::Complete;
        self.progress = 100;
        self.updated_at = Utc::now();
    }

    /// Mark the job failed with a message.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.phase = JobPhase::Failed;
        self.error_message = Some(message.into());
        self.updated_at = Utc::now();
    }

    /// Completed work units: one per synthesized frame, one per finished
    /// clip, one for a successful compile.
    pub fn completed_units(&self) -> u32 {
        let mut units = 0u32;
        for shot in &self.shots {
            if shot.start_image_url.is_some() {
                units += 1;
            }
            if shot.end_image_url.is_some() {
                units += 1;
            }
            if shot.video_url.is_some() {
                units += 1;
            }
        }
        if self.final_artifact_url.is_some() {
            units += 1;
        }
        units
    }

    /// Total work units: 3 per shot plus 1 when compiling.
    pub fn total_units(&self) -> u32 {
        let n = self.shots.len() as u32;
        3 * n + if self.compile_enabled { 1 } else { 0 }
    }

    /// Recompute progress from shot slots. Never decreases; 100 only on
    /// completion.
    pub fn recompute_progress(&mut self) {
        let total = self.total_units();
        if total == 0 {
            return;
        }
        let computed =
            ((100.0 * self.completed_units() as f64 / total as f64).round() as u8).min(99);
        let value = if self.phase == JobPhase::Complete {
            100
        } else {
            computed
        };
        if value > self.progress {
            self.progress = value;
            self.updated_at = Utc::now();
        }
    }

    /// Shots still eligible for work (non-terminal).
    pub fn open_shots(&self) -> usize {
        self.shots.iter().filter(|s| !s.state.is_terminal()).count()
    }
}
