//! Scripted in-process adapters.
//!
//! Used by unit and pipeline tests and by synthetic canary jobs: outcomes
//! are scripted up front (failure injection, poll counts) and every call is
//! recorded so tests can assert on deduplication and ordering.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use reel_models::AspectRatio;

use crate::error::{ProviderError, ProviderResult};
use crate::traits::{
    ChatOptions, ChatOutput, CompileOptions, CompilePoll, Compilation, ImageOutput,
    ImageSynthesis, RemoteStatus, TextCompletion, VideoPoll, VideoRequest, VideoSynthesis,
};

fn words(n: usize, seed: &str) -> String {
    (0..n)
        .map(|i| format!("{}{}", seed, i))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Scripted text completion.
#[derive(Default)]
pub struct MockText {
    responses: Mutex<Vec<ProviderResult<String>>>,
    calls: AtomicU32,
}

impl MockText {
    /// Always answer with the canned default plan.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer with the given content on every call.
    pub fn returning(content: impl Into<String>) -> Self {
        let mock = Self::default();
        mock.push_response(Ok(content.into()));
        mock
    }

    /// Queue a scripted response; responses are consumed FIFO and the last
    /// one repeats once the queue is drained.
    pub fn push_response(&self, response: ProviderResult<String>) {
        self.responses
            .lock()
            .expect("mock lock poisoned")
            .push(response);
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// A minimal valid plan for a 30 second target: one scene, four
    /// 7.5 second shots, prompts above the token floor.
    pub fn default_plan_json() -> String {
        let shot = |id: u32| {
            format!(
                r#"{{"id": {id}, "duration": 7.5,
                    "start_prompt": "{start}",
                    "end_prompt": "{end}",
                    "motion_prompt": "{motion}",
                    "camera_move": "push_in",
                    "lighting": "soft dawn light",
                    "transition_out": "cut"}}"#,
                id = id,
                start = words(20, "start"),
                end = words(20, "end"),
                motion = words(20, "motion"),
            )
        };
        format!(
            r#"{{"title": "Canary Reel", "narrative": "A synthetic plan used for pipeline checks.",
                "total_duration": 30.0,
                "scenes": [{{"id": 1, "name": "Only Scene", "description": "Scripted scene",
                             "mood": "calm", "shots": [{}, {}, {}, {}]}}]}}"#,
            shot(1),
            shot(2),
            shot(3),
            shot(4)
        )
    }
}

#[async_trait]
impl TextCompletion for MockText {
    async fn chat(
        &self,
        _system_prompt: &str,
        _user_prompt: &str,
        _options: &ChatOptions,
    ) -> ProviderResult<ChatOutput> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
        let mut responses = self.responses.lock().expect("mock lock poisoned");
        let content = if responses.is_empty() {
            Self::default_plan_json()
        } else {
            let index = call.min(responses.len() - 1);
            match &mut responses[index] {
                Ok(content) => content.clone(),
                Err(_) => {
                    // Errors are single-use; take it out so a retry can succeed.
                    let err = std::mem::replace(
                        &mut responses[index],
                        Ok(Self::default_plan_json()),
                    );
                    return Err(err.expect_err("scripted error"));
                }
            }
        };
        Ok(ChatOutput {
            content,
            input_tokens: Some(2000),
            output_tokens: Some(1500),
        })
    }

    fn estimate_cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        (input_tokens + output_tokens) as f64 * 1e-7
    }
}

/// Scripted image synthesis.
#[derive(Default)]
pub struct MockImage {
    transient_failures: Mutex<Vec<ProviderError>>,
    permanent_prompts: Mutex<Vec<String>>,
    counter: AtomicU32,
    calls: AtomicU32,
}

impl MockImage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue transient errors consumed (FIFO) before any success.
    pub fn push_failure(&self, error: ProviderError) {
        self.transient_failures
            .lock()
            .expect("mock lock poisoned")
            .push(error);
    }

    /// Permanently fail any prompt containing the given substring.
    pub fn fail_prompts_containing(&self, needle: impl Into<String>) {
        self.permanent_prompts
            .lock()
            .expect("mock lock poisoned")
            .push(needle.into());
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageSynthesis for MockImage {
    async fn synthesize(
        &self,
        prompt: &str,
        width: u32,
        height: u32,
        seed: Option<u64>,
    ) -> ProviderResult<ImageOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        {
            let permanent = self.permanent_prompts.lock().expect("mock lock poisoned");
            if permanent.iter().any(|needle| prompt.contains(needle.as_str())) {
                return Err(ProviderError::http(400, "prompt rejected"));
            }
        }

        {
            let mut failures = self.transient_failures.lock().expect("mock lock poisoned");
            if !failures.is_empty() {
                return Err(failures.remove(0));
            }
        }

        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(ImageOutput {
            url: format!("https://images.mock/frame-{}.png", n),
            width,
            height,
            seed,
        })
    }

    fn estimate_cost(&self) -> f64 {
        0.04
    }
}

/// Scripted video synthesis.
pub struct MockVideo {
    polls_until_done: u32,
    always_running: bool,
    supports_end_frame: bool,
    fail_motion_prompts: Mutex<Vec<String>>,
    transient_submit_failures: Mutex<Vec<ProviderError>>,
    handle_polls: Mutex<HashMap<String, u32>>,
    submitted: Mutex<Vec<VideoRequest>>,
    submit_seq: AtomicU32,
}

impl Default for MockVideo {
    fn default() -> Self {
        Self {
            polls_until_done: 1,
            always_running: false,
            supports_end_frame: true,
            fail_motion_prompts: Mutex::new(Vec::new()),
            transient_submit_failures: Mutex::new(Vec::new()),
            handle_polls: Mutex::new(HashMap::new()),
            submitted: Mutex::new(Vec::new()),
            submit_seq: AtomicU32::new(0),
        }
    }
}

impl MockVideo {
    /// Completes each request after one poll.
    pub fn new() -> Self {
        Self::default()
    }

    /// Completes each request after `n` polls.
    pub fn completing_after(n: u32) -> Self {
        Self {
            polls_until_done: n.max(1),
            ..Self::default()
        }
    }

    /// Never finishes; every poll reports running.
    pub fn always_running() -> Self {
        Self {
            always_running: true,
            ..Self::default()
        }
    }

    pub fn without_end_frame_support(mut self) -> Self {
        self.supports_end_frame = false;
        self
    }

    /// Permanently fail submission of any request whose motion prompt
    /// contains the given substring.
    pub fn fail_motion_containing(&self, needle: impl Into<String>) {
        self.fail_motion_prompts
            .lock()
            .expect("mock lock poisoned")
            .push(needle.into());
    }

    /// Queue transient submit errors consumed (FIFO) before any success.
    pub fn push_submit_failure(&self, error: ProviderError) {
        self.transient_submit_failures
            .lock()
            .expect("mock lock poisoned")
            .push(error);
    }

    pub fn submit_count(&self) -> u32 {
        self.submit_seq.load(Ordering::SeqCst)
    }

    pub fn submitted_requests(&self) -> Vec<VideoRequest> {
        self.submitted.lock().expect("mock lock poisoned").clone()
    }

    pub fn poll_count(&self) -> u32 {
        self.handle_polls
            .lock()
            .expect("mock lock poisoned")
            .values()
            .sum()
    }
}

#[async_trait]
impl VideoSynthesis for MockVideo {
    async fn submit(&self, request: &VideoRequest) -> ProviderResult<String> {
        {
            let fail = self.fail_motion_prompts.lock().expect("mock lock poisoned");
            if fail
                .iter()
                .any(|needle| request.motion_prompt.contains(needle.as_str()))
            {
                return Err(ProviderError::http(422, "motion prompt rejected"));
            }
        }

        {
            let mut failures = self
                .transient_submit_failures
                .lock()
                .expect("mock lock poisoned");
            if !failures.is_empty() {
                return Err(failures.remove(0));
            }
        }

        let n = self.submit_seq.fetch_add(1, Ordering::SeqCst);
        self.submitted
            .lock()
            .expect("mock lock poisoned")
            .push(request.clone());
        Ok(format!("vid-{}", n))
    }

    async fn poll(&self, handle: &str) -> ProviderResult<VideoPoll> {
        if self.always_running {
            // Still counts as a poll for ceiling assertions.
            *self
                .handle_polls
                .lock()
                .expect("mock lock poisoned")
                .entry(handle.to_string())
                .or_insert(0) += 1;
            return Ok(VideoPoll {
                status: RemoteStatus::Running,
                url: None,
                error: None,
            });
        }

        let mut polls = self.handle_polls.lock().expect("mock lock poisoned");
        let count = polls.entry(handle.to_string()).or_insert(0);
        *count += 1;

        if *count >= self.polls_until_done {
            Ok(VideoPoll {
                status: RemoteStatus::Done,
                url: Some(format!("https://videos.mock/{}.mp4", handle)),
                error: None,
            })
        } else {
            Ok(VideoPoll {
                status: RemoteStatus::Running,
                url: None,
                error: None,
            })
        }
    }

    fn supports_end_frame(&self) -> bool {
        self.supports_end_frame
    }

    fn estimate_cost(&self, duration_seconds: f64) -> f64 {
        duration_seconds * 0.08
    }
}

/// Scripted compilation.
pub struct MockCompilation {
    polls_until_done: u32,
    fail: bool,
    transient_submit_failures: Mutex<Vec<ProviderError>>,
    handle_polls: Mutex<HashMap<String, u32>>,
    submitted: Mutex<Vec<Vec<String>>>,
    submit_seq: AtomicU32,
}

impl Default for MockCompilation {
    fn default() -> Self {
        Self {
            polls_until_done: 1,
            fail: false,
            transient_submit_failures: Mutex::new(Vec::new()),
            handle_polls: Mutex::new(HashMap::new()),
            submitted: Mutex::new(Vec::new()),
            submit_seq: AtomicU32::new(0),
        }
    }
}

impl MockCompilation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn completing_after(n: u32) -> Self {
        Self {
            polls_until_done: n.max(1),
            ..Self::default()
        }
    }

    /// Renders always fail.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Queue transient submit errors consumed (FIFO) before any success.
    pub fn push_submit_failure(&self, error: ProviderError) {
        self.transient_submit_failures
            .lock()
            .expect("mock lock poisoned")
            .push(error);
    }

    pub fn submit_count(&self) -> u32 {
        self.submit_seq.load(Ordering::SeqCst)
    }

    pub fn submitted_clip_lists(&self) -> Vec<Vec<String>> {
        self.submitted.lock().expect("mock lock poisoned").clone()
    }
}

#[async_trait]
impl Compilation for MockCompilation {
    async fn submit(
        &self,
        clip_urls: &[String],
        _aspect_ratio: AspectRatio,
        _options: &CompileOptions,
    ) -> ProviderResult<String> {
        {
            let mut failures = self
                .transient_submit_failures
                .lock()
                .expect("mock lock poisoned");
            if !failures.is_empty() {
                return Err(failures.remove(0));
            }
        }

        let n = self.submit_seq.fetch_add(1, Ordering::SeqCst);
        self.submitted
            .lock()
            .expect("mock lock poisoned")
            .push(clip_urls.to_vec());
        Ok(format!("render-{}", n))
    }

    async fn poll(&self, handle: &str) -> ProviderResult<CompilePoll> {
        if self.fail {
            return Ok(CompilePoll {
                status: RemoteStatus::Failed,
                url: None,
                error: Some("render failed".to_string()),
            });
        }

        let mut polls = self.handle_polls.lock().expect("mock lock poisoned");
        let count = polls.entry(handle.to_string()).or_insert(0);
        *count += 1;

        if *count >= self.polls_until_done {
            Ok(CompilePoll {
                status: RemoteStatus::Done,
                url: Some(format!("https://videos.mock/{}-final.mp4", handle)),
                error: None,
            })
        } else {
            Ok(CompilePoll {
                status: RemoteStatus::Running,
                url: None,
                error: None,
            })
        }
    }

    fn estimate_cost(&self, clip_count: u32) -> f64 {
        clip_count as f64 * 0.05
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_image_transient_then_success() {
        let image = MockImage::new();
        image.push_failure(ProviderError::http(503, "unavailable"));

        let first = image.synthesize("a forest", 1920, 1080, None).await;
        assert!(first.is_err());
        assert!(first.unwrap_err().is_retryable());

        let second = image.synthesize("a forest", 1920, 1080, None).await;
        assert!(second.is_ok());
        assert_eq!(image.call_count(), 2);
    }

    #[tokio::test]
    async fn test_mock_video_completes_after_polls() {
        let video = MockVideo::completing_after(2);
        let handle = video
            .submit(&VideoRequest {
                motion_prompt: "drift forward".to_string(),
                start_image_url: "https://images.mock/a.png".to_string(),
                end_image_url: None,
                duration_seconds: 6.0,
                aspect_ratio: AspectRatio::Landscape,
            })
            .await
            .unwrap();

        let first = video.poll(&handle).await.unwrap();
        assert_eq!(first.status, RemoteStatus::Running);

        let second = video.poll(&handle).await.unwrap();
        assert_eq!(second.status, RemoteStatus::Done);
        assert!(second.url.is_some());
    }

    #[tokio::test]
    async fn test_mock_text_default_plan_parses() {
        let text = MockText::new();
        let output = text
            .chat("system", "user", &ChatOptions::default())
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&output.content).unwrap();
        assert_eq!(value["scenes"][0]["shots"].as_array().unwrap().len(), 4);
    }
}
