//! Capability contracts consumed by the core.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use reel_models::AspectRatio;

use crate::error::ProviderResult;

/// Options for a text completion call.
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    /// Request JSON-shaped output from the model
    pub json_output: bool,
    /// Sampling temperature override
    pub temperature: Option<f32>,
    /// Output token cap
    pub max_output_tokens: Option<u32>,
}

/// Result of a text completion call.
#[derive(Debug, Clone)]
pub struct ChatOutput {
    /// The model's response, coerced to a single string
    pub content: String,
    /// Prompt token count, when the service reports it
    pub input_tokens: Option<u32>,
    /// Completion token count, when the service reports it
    pub output_tokens: Option<u32>,
}

/// Text completion capability.
#[async_trait]
pub trait TextCompletion: Send + Sync {
    /// Run a single chat turn.
    async fn chat(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &ChatOptions,
    ) -> ProviderResult<ChatOutput>;

    /// Estimated cost in USD for a call of the given token counts.
    fn estimate_cost(&self, input_tokens: u32, output_tokens: u32) -> f64;
}

/// Result of a frame synthesis call.
#[derive(Debug, Clone)]
pub struct ImageOutput {
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub seed: Option<u64>,
}

/// Image synthesis capability.
///
/// Synchronous from the caller's perspective: adapters backed by a remote
/// queue poll internally and return only a finished frame or an error.
#[async_trait]
pub trait ImageSynthesis: Send + Sync {
    async fn synthesize(
        &self,
        prompt: &str,
        width: u32,
        height: u32,
        seed: Option<u64>,
    ) -> ProviderResult<ImageOutput>;

    /// Estimated cost in USD per frame.
    fn estimate_cost(&self) -> f64;
}

/// Status of a remote asynchronous request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteStatus {
    Queued,
    Running,
    Done,
    Failed,
}

impl RemoteStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RemoteStatus::Done | RemoteStatus::Failed)
    }
}

/// A video synthesis request.
#[derive(Debug, Clone)]
pub struct VideoRequest {
    pub motion_prompt: String,
    pub start_image_url: String,
    /// Only set when the adapter advertises end-frame support
    pub end_image_url: Option<String>,
    pub duration_seconds: f64,
    pub aspect_ratio: AspectRatio,
}

/// Poll result for a video request.
#[derive(Debug, Clone)]
pub struct VideoPoll {
    pub status: RemoteStatus,
    pub url: Option<String>,
    pub error: Option<String>,
}

/// Video synthesis capability: submit a request, then poll its handle.
#[async_trait]
pub trait VideoSynthesis: Send + Sync {
    /// Submit a request; returns an opaque handle for polling.
    async fn submit(&self, request: &VideoRequest) -> ProviderResult<String>;

    /// Poll a previously submitted request.
    async fn poll(&self, handle: &str) -> ProviderResult<VideoPoll>;

    /// Whether the vendor accepts an end frame. Callers must not pass
    /// `end_image_url` when false.
    fn supports_end_frame(&self) -> bool;

    /// Estimated cost in USD for a clip of the given duration.
    fn estimate_cost(&self, duration_seconds: f64) -> f64;
}

/// Options for a compile request.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Per-clip outgoing transitions, in clip order
    pub transitions: Vec<reel_models::Transition>,
}

/// Poll result for a compile request.
#[derive(Debug, Clone)]
pub struct CompilePoll {
    pub status: RemoteStatus,
    pub url: Option<String>,
    pub error: Option<String>,
}

/// Clip compilation capability.
#[async_trait]
pub trait Compilation: Send + Sync {
    /// Submit the ordered clip list; returns an opaque handle for polling.
    async fn submit(
        &self,
        clip_urls: &[String],
        aspect_ratio: AspectRatio,
        options: &CompileOptions,
    ) -> ProviderResult<String>;

    /// Poll a previously submitted compile request.
    async fn poll(&self, handle: &str) -> ProviderResult<CompilePoll>;

    /// Estimated cost in USD for compiling the given number of clips.
    fn estimate_cost(&self, clip_count: u32) -> f64;
}
