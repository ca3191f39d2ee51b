//! REST prediction-queue adapters for image, video, and compile services.
//!
//! All three speak the same wire shape: POST a request to a queue endpoint,
//! receive an id, then GET the id until the prediction reaches a terminal
//! status. The image adapter hides the polling behind a deadline so callers
//! see a blocking call; video and compile expose submit/poll to the
//! orchestrator's scheduler-driven loop.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use reel_models::AspectRatio;

use crate::credentials::Credential;
use crate::error::{ProviderError, ProviderResult};
use crate::traits::{
    CompileOptions, CompilePoll, Compilation, ImageOutput, ImageSynthesis, RemoteStatus,
    VideoPoll, VideoRequest, VideoSynthesis,
};

/// How long the image adapter will poll before giving up on a frame.
const IMAGE_POLL_DEADLINE: Duration = Duration::from_secs(120);

/// Delay between internal image poll rounds.
const IMAGE_POLL_INTERVAL: Duration = Duration::from_secs(2);

const IMAGE_COST_PER_FRAME: f64 = 0.04;
const VIDEO_COST_PER_SECOND: f64 = 0.08;
const COMPILE_COST_PER_CLIP: f64 = 0.05;

#[derive(Debug, Serialize)]
struct SubmitRequest<T: Serialize> {
    input: T,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    id: String,
    status: String,
    #[serde(default)]
    output: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Map a queue status string onto the closed status set.
fn parse_remote_status(raw: &str) -> ProviderResult<RemoteStatus> {
    match raw {
        "queued" | "starting" | "pending" => Ok(RemoteStatus::Queued),
        "processing" | "running" | "in_progress" => Ok(RemoteStatus::Running),
        "succeeded" | "completed" | "done" => Ok(RemoteStatus::Done),
        "failed" | "canceled" | "error" => Ok(RemoteStatus::Failed),
        other => Err(ProviderError::invalid_response(format!(
            "Unknown prediction status: {}",
            other
        ))),
    }
}

fn build_client() -> ProviderResult<Client> {
    Ok(Client::builder().timeout(Duration::from_secs(60)).build()?)
}

/// Resolve the queue base URL: credential override first, then config.
fn resolve_endpoint(
    credential: &Credential,
    config_endpoint: Option<&str>,
    capability: &str,
) -> ProviderResult<String> {
    credential
        .endpoint
        .clone()
        .or_else(|| config_endpoint.map(str::to_string))
        .map(|e| e.trim_end_matches('/').to_string())
        .ok_or_else(|| {
            ProviderError::missing_credentials(format!("{} endpoint not configured", capability))
        })
}

async fn submit_prediction<T: Serialize + Sync>(
    client: &Client,
    url: &str,
    token: &str,
    input: &T,
) -> ProviderResult<Prediction> {
    let response = client
        .post(url)
        .bearer_auth(token)
        .json(&SubmitRequest { input })
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::from_status(status, body));
    }

    response
        .json()
        .await
        .map_err(|e| ProviderError::invalid_response(format!("Prediction response: {}", e)))
}

async fn fetch_prediction(client: &Client, url: &str, token: &str) -> ProviderResult<Prediction> {
    let response = client.get(url).bearer_auth(token).send().await?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::from_status(status, body));
    }

    response
        .json()
        .await
        .map_err(|e| ProviderError::invalid_response(format!("Prediction response: {}", e)))
}

// =============================================================================
// Image
// =============================================================================

#[derive(Debug, Serialize)]
struct ImageInput<'a> {
    prompt: &'a str,
    width: u32,
    height: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
}

/// Image synthesis against a REST prediction queue.
pub struct RestImage {
    endpoint: String,
    token: String,
    client: Client,
}

impl RestImage {
    pub fn new(credential: &Credential, config_endpoint: Option<&str>) -> ProviderResult<Self> {
        Ok(Self {
            endpoint: resolve_endpoint(credential, config_endpoint, "image")?,
            token: credential.token.clone(),
            client: build_client()?,
        })
    }
}

#[async_trait::async_trait]
impl ImageSynthesis for RestImage {
    async fn synthesize(
        &self,
        prompt: &str,
        width: u32,
        height: u32,
        seed: Option<u64>,
    ) -> ProviderResult<ImageOutput> {
        let submit_url = format!("{}/predictions", self.endpoint);
        let input = ImageInput {
            prompt,
            width,
            height,
            seed,
        };

        let submitted = submit_prediction(&self.client, &submit_url, &self.token, &input).await?;
        debug!(prediction_id = %submitted.id, "Image prediction submitted");

        // Queue-backed vendor: poll inside the call until the deadline.
        let deadline = Instant::now() + IMAGE_POLL_DEADLINE;
        let poll_url = format!("{}/predictions/{}", self.endpoint, submitted.id);
        let mut current = submitted;

        loop {
            match parse_remote_status(&current.status)? {
                RemoteStatus::Done => {
                    let url = current.output.ok_or_else(|| {
                        ProviderError::invalid_response("Finished image prediction has no output")
                    })?;
                    return Ok(ImageOutput {
                        url,
                        width,
                        height,
                        seed,
                    });
                }
                RemoteStatus::Failed => {
                    return Err(ProviderError::invalid_response(
                        current
                            .error
                            .unwrap_or_else(|| "Image prediction failed".to_string()),
                    ));
                }
                RemoteStatus::Queued | RemoteStatus::Running => {
                    if Instant::now() >= deadline {
                        return Err(ProviderError::timeout(format!(
                            "Image prediction {} did not finish within {:?}",
                            current.id, IMAGE_POLL_DEADLINE
                        )));
                    }
                    tokio::time::sleep(IMAGE_POLL_INTERVAL).await;
                    current = fetch_prediction(&self.client, &poll_url, &self.token).await?;
                }
            }
        }
    }

    fn estimate_cost(&self) -> f64 {
        IMAGE_COST_PER_FRAME
    }
}

// =============================================================================
// Video
// =============================================================================

#[derive(Debug, Serialize)]
struct VideoInput<'a> {
    prompt: &'a str,
    start_image: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    end_image: Option<&'a str>,
    duration: f64,
    aspect_ratio: &'a str,
}

/// Video synthesis against a REST prediction queue.
pub struct RestVideo {
    endpoint: String,
    token: String,
    supports_end_frame: bool,
    client: Client,
}

impl RestVideo {
    pub fn new(
        credential: &Credential,
        config_endpoint: Option<&str>,
        supports_end_frame: bool,
    ) -> ProviderResult<Self> {
        Ok(Self {
            endpoint: resolve_endpoint(credential, config_endpoint, "video")?,
            token: credential.token.clone(),
            supports_end_frame,
            client: build_client()?,
        })
    }
}

#[async_trait::async_trait]
impl VideoSynthesis for RestVideo {
    async fn submit(&self, request: &VideoRequest) -> ProviderResult<String> {
        if request.end_image_url.is_some() && !self.supports_end_frame {
            return Err(ProviderError::Unsupported(
                "end frame passed to a provider without end-frame support".to_string(),
            ));
        }

        let url = format!("{}/predictions", self.endpoint);
        let input = VideoInput {
            prompt: &request.motion_prompt,
            start_image: &request.start_image_url,
            end_image: request.end_image_url.as_deref(),
            duration: request.duration_seconds,
            aspect_ratio: request.aspect_ratio.as_str(),
        };

        let submitted = submit_prediction(&self.client, &url, &self.token, &input).await?;
        debug!(prediction_id = %submitted.id, "Video prediction submitted");
        Ok(submitted.id)
    }

    async fn poll(&self, handle: &str) -> ProviderResult<VideoPoll> {
        let url = format!("{}/predictions/{}", self.endpoint, handle);
        let prediction = fetch_prediction(&self.client, &url, &self.token).await?;
        Ok(VideoPoll {
            status: parse_remote_status(&prediction.status)?,
            url: prediction.output,
            error: prediction.error,
        })
    }

    fn supports_end_frame(&self) -> bool {
        self.supports_end_frame
    }

    fn estimate_cost(&self, duration_seconds: f64) -> f64 {
        duration_seconds * VIDEO_COST_PER_SECOND
    }
}

// =============================================================================
// Compile
// =============================================================================

#[derive(Debug, Serialize)]
struct CompileInput<'a> {
    clips: &'a [String],
    aspect_ratio: &'a str,
    transitions: Vec<&'static str>,
}

/// Clip compilation against a REST render queue.
pub struct RestCompilation {
    endpoint: String,
    token: String,
    client: Client,
}

impl RestCompilation {
    pub fn new(credential: &Credential, config_endpoint: Option<&str>) -> ProviderResult<Self> {
        Ok(Self {
            endpoint: resolve_endpoint(credential, config_endpoint, "compile")?,
            token: credential.token.clone(),
            client: build_client()?,
        })
    }
}

#[async_trait::async_trait]
impl Compilation for RestCompilation {
    async fn submit(
        &self,
        clip_urls: &[String],
        aspect_ratio: AspectRatio,
        options: &CompileOptions,
    ) -> ProviderResult<String> {
        let url = format!("{}/renders", self.endpoint);
        let input = CompileInput {
            clips: clip_urls,
            aspect_ratio: aspect_ratio.as_str(),
            transitions: options.transitions.iter().map(|t| t.as_str()).collect(),
        };

        let submitted = submit_prediction(&self.client, &url, &self.token, &input).await?;
        debug!(render_id = %submitted.id, "Compile render submitted");
        Ok(submitted.id)
    }

    async fn poll(&self, handle: &str) -> ProviderResult<CompilePoll> {
        let url = format!("{}/renders/{}", self.endpoint, handle);
        let prediction = fetch_prediction(&self.client, &url, &self.token).await?;
        Ok(CompilePoll {
            status: parse_remote_status(&prediction.status)?,
            url: prediction.output,
            error: prediction.error,
        })
    }

    fn estimate_cost(&self, clip_count: u32) -> f64 {
        clip_count as f64 * COMPILE_COST_PER_CLIP
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(parse_remote_status("queued").unwrap(), RemoteStatus::Queued);
        assert_eq!(
            parse_remote_status("processing").unwrap(),
            RemoteStatus::Running
        );
        assert_eq!(
            parse_remote_status("succeeded").unwrap(),
            RemoteStatus::Done
        );
        assert_eq!(parse_remote_status("failed").unwrap(), RemoteStatus::Failed);
        assert!(parse_remote_status("sideways").is_err());
    }

    #[test]
    fn test_endpoint_resolution_precedence() {
        let credential = Credential {
            endpoint: Some("https://user.example/api/".to_string()),
            token: "t".to_string(),
            model: None,
            quality: None,
            extra: None,
        };
        let resolved = resolve_endpoint(&credential, Some("https://default.example"), "image");
        assert_eq!(resolved.unwrap(), "https://user.example/api");

        let bare = Credential::token_only("t");
        let resolved = resolve_endpoint(&bare, Some("https://default.example/"), "image");
        assert_eq!(resolved.unwrap(), "https://default.example");

        assert!(resolve_endpoint(&bare, None, "image").is_err());
    }
}
