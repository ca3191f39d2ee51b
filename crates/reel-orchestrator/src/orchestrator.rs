//! The per-job state machine.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use reel_models::{Job, JobId, JobPhase, ShotJob, ShotState};
use reel_providers::{CompileOptions, ProviderError, ProviderResult, VideoRequest};
use reel_store::{JobStore, WriteLease};

use crate::adapters::AdapterFactory;
use crate::backoff::BackoffPolicy;
use crate::config::OrchestratorConfig;
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::scheduler::{Scheduler, WakeUp};

/// What a phase driver decided.
enum StepOutcome {
    /// Move on to the next phase within this wake-up
    Advance,
    /// Arm a timer and yield
    Rearm(Duration),
    /// The job reached a terminal phase
    Terminal,
}

/// How a failed shot-level call was absorbed.
enum ShotFailure {
    /// Transient; retry after this delay
    Backoff(Duration),
    /// The shot is now failed; siblings continue
    ShotFailed,
}

/// Drives jobs through the image, video, and compile phases.
///
/// Multi-writer across distinct jobs, single-writer per job: every entry
/// point claims the write lease or exits quietly. All state needed to
/// resume lives in the job record; nothing is kept on the stack across a
/// yield.
pub struct Orchestrator {
    jobs: Arc<dyn JobStore>,
    factory: Arc<dyn AdapterFactory>,
    scheduler: Scheduler,
    backoff: BackoffPolicy,
    config: OrchestratorConfig,
    holder: String,
}

impl Orchestrator {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        factory: Arc<dyn AdapterFactory>,
        scheduler: Scheduler,
        config: OrchestratorConfig,
    ) -> Self {
        let backoff = BackoffPolicy::new(config.backoff_base, config.backoff_cap);
        Self {
            jobs,
            factory,
            scheduler,
            backoff,
            config,
            holder: format!("worker-{}", Uuid::new_v4()),
        }
    }

    /// Consume wake-ups, spawning one task per firing. Jobs run
    /// concurrently; the per-job lease keeps each one single-writer.
    pub fn spawn_runtime(
        self: Arc<Self>,
        mut rx: mpsc::UnboundedReceiver<WakeUp>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(wake) = rx.recv().await {
                let orchestrator = Arc::clone(&self);
                tokio::spawn(async move {
                    orchestrator.resume(&wake.owner_id, &wake.job_id).await;
                });
            }
        })
    }

    /// Kick off a newly created job. Invoked once after plan approval.
    pub fn start(&self, owner_id: &str, job_id: &JobId) {
        info!(owner_id = %owner_id, job_id = %job_id, "Starting job");
        self.scheduler.arm_now(owner_id, job_id);
    }

    /// Arm an immediate wake-up, e.g. so a cancel request is observed
    /// without waiting out the current timer.
    pub fn wake(&self, owner_id: &str, job_id: &JobId) {
        self.scheduler.arm_now(owner_id, job_id);
    }

    /// Arm an immediate wake-up for every non-terminal job. Run once on
    /// process start so in-flight jobs survive restarts.
    pub async fn recover(&self) -> usize {
        match self.jobs.active_jobs().await {
            Ok(active) => {
                let count = active.len();
                for (owner_id, job_id) in active {
                    self.scheduler.arm_now(&owner_id, &job_id);
                }
                if count > 0 {
                    info!(count, "Recovered in-flight jobs");
                }
                count
            }
            Err(e) => {
                error!("Recovery sweep failed: {}", e);
                0
            }
        }
    }

    /// Wake-up entry: claim the lease, run, release. Safe to invoke any
    /// number of times; duplicate firings find either the lease held or
    /// nothing left to do.
    pub async fn resume(&self, owner_id: &str, job_id: &JobId) {
        let lease = match self
            .jobs
            .try_claim(owner_id, job_id, &self.holder, self.config.lease_ttl)
            .await
        {
            Ok(Some(lease)) => lease,
            Ok(None) => {
                debug!(job_id = %job_id, "Lease held elsewhere, yielding");
                return;
            }
            Err(e) => {
                warn!(job_id = %job_id, "Could not claim job: {}", e);
                return;
            }
        };

        if let Err(e) = self.run(&lease).await {
            error!(job_id = %job_id, "Orchestration error: {}", e);
            self.fail_internal(&lease).await;
        }

        if let Err(e) = self.jobs.release(&lease).await {
            warn!(job_id = %job_id, "Lease release failed: {}", e);
        }
    }

    async fn run(&self, lease: &WriteLease) -> OrchestratorResult<()> {
        let owner_id = lease.owner_id.clone();
        let job_id = lease.job_id.clone();

        let mut job = self
            .jobs
            .get(&owner_id, &job_id)
            .await?
            .ok_or_else(|| OrchestratorError::JobNotFound(job_id.to_string()))?;

        loop {
            if job.phase.is_terminal() {
                self.scheduler.disarm(&owner_id, &job_id);
                return Ok(());
            }

            if job.cancel_requested {
                info!(job_id = %job_id, "Cancel observed");
                job.fail("Cancelled");
                self.jobs.commit(lease, &job).await?;
                self.scheduler.disarm(&owner_id, &job_id);
                return Ok(());
            }

            let outcome = match job.phase {
                JobPhase::Pending => {
                    job.set_phase(JobPhase::GeneratingImages);
                    self.jobs.commit(lease, &job).await?;
                    StepOutcome::Advance
                }
                JobPhase::GeneratingImages => self.drive_images(lease, &mut job).await?,
                JobPhase::ImagesComplete => {
                    job.set_phase(JobPhase::GeneratingVideos);
                    self.jobs.commit(lease, &job).await?;
                    StepOutcome::Advance
                }
                JobPhase::GeneratingVideos => self.drive_videos(lease, &mut job).await?,
                JobPhase::VideosComplete => self.leave_videos_complete(lease, &mut job).await?,
                JobPhase::Compiling => self.drive_compile(lease, &mut job).await?,
                JobPhase::Complete | JobPhase::Failed => StepOutcome::Terminal,
            };

            match outcome {
                StepOutcome::Advance => continue,
                StepOutcome::Rearm(delay) => {
                    self.scheduler.arm_in(&owner_id, &job_id, delay);
                    return Ok(());
                }
                StepOutcome::Terminal => {
                    self.scheduler.disarm(&owner_id, &job_id);
                    return Ok(());
                }
            }
        }
    }

    /// Best-effort terminal write for unexpected internal failures. The
    /// raw error stays in the logs; the record gets a redacted message.
    async fn fail_internal(&self, lease: &WriteLease) {
        if let Ok(Some(mut job)) = self.jobs.get(&lease.owner_id, &lease.job_id).await {
            if !job.phase.is_terminal() {
                job.fail("Internal error");
                if let Err(e) = self.jobs.commit(lease, &job).await {
                    error!(job_id = %lease.job_id, "Could not record internal failure: {}", e);
                }
            }
        }
        self.scheduler.disarm(&lease.owner_id, &lease.job_id);
    }

    /// Run an adapter call under the per-call deadline.
    async fn with_deadline<T>(
        &self,
        what: &str,
        call: impl Future<Output = ProviderResult<T>>,
    ) -> ProviderResult<T> {
        match tokio::time::timeout(self.config.call_deadline, call).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::timeout(format!(
                "{} exceeded {:?}",
                what, self.config.call_deadline
            ))),
        }
    }

    /// Absorb a failed shot-level call: transient errors consume one of the
    /// shot's persisted retry attempts and back off through the scheduler;
    /// exhausted budgets and permanent errors fail the shot only.
    fn absorb_shot_failure(
        &self,
        shot: &mut ShotJob,
        error: ProviderError,
        what: &str,
    ) -> ShotFailure {
        if error.is_retryable() {
            shot.retry_attempts += 1;
            if shot.retry_attempts <= self.config.retry_budget {
                let delay = self.backoff.delay(shot.retry_attempts);
                warn!(
                    scene_id = shot.scene_id,
                    shot_index = shot.shot_index,
                    attempt = shot.retry_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "{} failed, will retry: {}",
                    what,
                    error
                );
                return ShotFailure::Backoff(delay);
            }
            shot.fail(format!(
                "{} failed after {} retries: {}",
                what, self.config.retry_budget, error
            ));
            return ShotFailure::ShotFailed;
        }

        warn!(
            scene_id = shot.scene_id,
            shot_index = shot.shot_index,
            "{} failed permanently: {}",
            what,
            error
        );
        shot.fail(format!("{} failed: {}", what, error));
        ShotFailure::ShotFailed
    }

    // =========================================================================
    // Phase: GeneratingImages
    // =========================================================================

    async fn drive_images(
        &self,
        lease: &WriteLease,
        job: &mut Job,
    ) -> OrchestratorResult<StepOutcome> {
        let adapter = match self.factory.image(&job.owner_id, &job.providers.image).await {
            Ok(adapter) => Some(adapter),
            Err(e) => {
                warn!(job_id = %job.id, "Image provider unavailable: {}", e);
                for shot in job.shots.iter_mut().filter(|s| !s.state.is_terminal()) {
                    shot.fail(format!("Image provider unavailable: {}", e));
                }
                None
            }
        };

        if let Some(image) = adapter {
            let (width, height) = job.aspect_ratio.image_dimensions();

            for index in 0..job.shots.len() {
                if job.shots[index].state.is_terminal() || job.shots[index].has_both_images() {
                    continue;
                }

                if job.shots[index].start_image_url.is_none() {
                    if job.shots[index].state != ShotState::GeneratingStart {
                        job.shots[index].state = ShotState::GeneratingStart;
                        self.jobs.commit(lease, job).await?;
                    }

                    let prompt = job.shots[index].start_prompt.clone();
                    let result = self
                        .with_deadline("Start frame synthesis", image.synthesize(&prompt, width, height, None))
                        .await;

                    match result {
                        Ok(output) => {
                            let shot = &mut job.shots[index];
                            shot.start_image_url = Some(output.url);
                            shot.state = ShotState::GeneratingEnd;
                            shot.retry_attempts = 0;
                            job.recompute_progress();
                            self.jobs.commit(lease, job).await?;
                        }
                        Err(e) => {
                            match self.absorb_shot_failure(
                                &mut job.shots[index],
                                e,
                                "Start frame synthesis",
                            ) {
                                ShotFailure::Backoff(delay) => {
                                    self.jobs.commit(lease, job).await?;
                                    return Ok(StepOutcome::Rearm(delay));
                                }
                                ShotFailure::ShotFailed => {
                                    self.jobs.commit(lease, job).await?;
                                    continue;
                                }
                            }
                        }
                    }
                }

                if job.shots[index].end_image_url.is_none() {
                    if job.shots[index].state != ShotState::GeneratingEnd {
                        job.shots[index].state = ShotState::GeneratingEnd;
                        self.jobs.commit(lease, job).await?;
                    }

                    let prompt = job.shots[index].end_prompt.clone();
                    let result = self
                        .with_deadline("End frame synthesis", image.synthesize(&prompt, width, height, None))
                        .await;

                    match result {
                        Ok(output) => {
                            let shot = &mut job.shots[index];
                            shot.end_image_url = Some(output.url);
                            // Both frames exist; the shot now waits for the
                            // video phase.
                            shot.state = ShotState::Pending;
                            shot.retry_attempts = 0;
                            job.recompute_progress();
                            self.jobs.commit(lease, job).await?;
                        }
                        Err(e) => {
                            match self.absorb_shot_failure(
                                &mut job.shots[index],
                                e,
                                "End frame synthesis",
                            ) {
                                ShotFailure::Backoff(delay) => {
                                    self.jobs.commit(lease, job).await?;
                                    return Ok(StepOutcome::Rearm(delay));
                                }
                                ShotFailure::ShotFailed => {
                                    self.jobs.commit(lease, job).await?;
                                    continue;
                                }
                            }
                        }
                    }
                }
            }
        }

        // Partial-success policy: continue with whatever has both frames.
        let usable = job.shots.iter().filter(|s| s.has_both_images()).count();
        if usable == 0 {
            job.fail("All shots failed during image generation");
            self.jobs.commit(lease, job).await?;
            return Ok(StepOutcome::Terminal);
        }

        job.set_phase(JobPhase::ImagesComplete);
        self.jobs.commit(lease, job).await?;
        Ok(StepOutcome::Advance)
    }

    // =========================================================================
    // Phase: GeneratingVideos
    // =========================================================================

    async fn drive_videos(
        &self,
        lease: &WriteLease,
        job: &mut Job,
    ) -> OrchestratorResult<StepOutcome> {
        let mut submitted_any = false;

        let needs_submit = job.shots.iter().any(|s| {
            !s.state.is_terminal() && s.has_both_images() && s.video_request_handle.is_none()
        });

        if needs_submit {
            match self.factory.video(&job.owner_id, &job.providers.video).await {
                Ok(video) => {
                    let supports_end_frame = video.supports_end_frame();

                    for index in 0..job.shots.len() {
                        let eligible = {
                            let shot = &job.shots[index];
                            !shot.state.is_terminal()
                                && shot.has_both_images()
                                && shot.video_request_handle.is_none()
                        };
                        if !eligible {
                            continue;
                        }

                        if job.shots[index].state != ShotState::SubmittingVideo {
                            job.shots[index].state = ShotState::SubmittingVideo;
                            self.jobs.commit(lease, job).await?;
                        }

                        let request = {
                            let shot = &job.shots[index];
                            let start_image_url = match shot.start_image_url.clone() {
                                Some(url) => url,
                                None => continue,
                            };
                            VideoRequest {
                                motion_prompt: shot.motion_prompt.clone(),
                                start_image_url,
                                end_image_url: if supports_end_frame {
                                    shot.end_image_url.clone()
                                } else {
                                    None
                                },
                                duration_seconds: shot.duration,
                                aspect_ratio: job.aspect_ratio,
                            }
                        };

                        let result = self
                            .with_deadline("Video submission", video.submit(&request))
                            .await;

                        match result {
                            Ok(handle) => {
                                let shot = &mut job.shots[index];
                                shot.video_request_handle = Some(handle);
                                shot.state = ShotState::PollingVideo;
                                shot.retry_attempts = 0;
                                self.jobs.commit(lease, job).await?;
                                submitted_any = true;
                            }
                            Err(e) => {
                                match self.absorb_shot_failure(
                                    &mut job.shots[index],
                                    e,
                                    "Video submission",
                                ) {
                                    ShotFailure::Backoff(delay) => {
                                        self.jobs.commit(lease, job).await?;
                                        return Ok(StepOutcome::Rearm(delay));
                                    }
                                    ShotFailure::ShotFailed => {
                                        self.jobs.commit(lease, job).await?;
                                        continue;
                                    }
                                }
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!(job_id = %job.id, "Video provider unavailable: {}", e);
                    for shot in job.shots.iter_mut().filter(|s| {
                        !s.state.is_terminal()
                            && s.has_both_images()
                            && s.video_request_handle.is_none()
                    }) {
                        shot.fail(format!("Video provider unavailable: {}", e));
                    }
                    self.jobs.commit(lease, job).await?;
                }
            }
        }

        let polling = job
            .shots
            .iter()
            .filter(|s| s.state == ShotState::PollingVideo)
            .count();

        if polling == 0 {
            return self.finish_video_phase(lease, job).await;
        }

        if submitted_any {
            // Submissions done; the first poll tick comes on the timer.
            return Ok(StepOutcome::Rearm(self.config.poll_interval));
        }

        // Poll tick. Ceiling first, so an expired job issues no further
        // external calls.
        if job.poll_attempts >= self.config.video_poll_ceiling {
            warn!(
                job_id = %job.id,
                poll_attempts = job.poll_attempts,
                "Video polling ceiling reached"
            );
            job.fail(format!("Timeout in {:?}", JobPhase::GeneratingVideos));
            self.jobs.commit(lease, job).await?;
            return Ok(StepOutcome::Terminal);
        }

        match self.factory.video(&job.owner_id, &job.providers.video).await {
            Ok(video) => {
                for index in 0..job.shots.len() {
                    if job.shots[index].state != ShotState::PollingVideo {
                        continue;
                    }
                    let handle = match job.shots[index].video_request_handle.clone() {
                        Some(handle) => handle,
                        None => continue,
                    };

                    match self.with_deadline("Video poll", video.poll(&handle)).await {
                        Ok(poll) => {
                            use reel_providers::RemoteStatus;
                            let shot = &mut job.shots[index];
                            match poll.status {
                                RemoteStatus::Done => match poll.url {
                                    Some(url) => {
                                        shot.video_url = Some(url);
                                        shot.state = ShotState::Complete;
                                        shot.retry_attempts = 0;
                                    }
                                    None => shot.fail("Video finished without an output URL"),
                                },
                                RemoteStatus::Failed => {
                                    let message = poll
                                        .error
                                        .unwrap_or_else(|| "Video synthesis failed".to_string());
                                    shot.fail(message);
                                }
                                RemoteStatus::Queued | RemoteStatus::Running => {}
                            }
                        }
                        Err(e) => {
                            // Transient poll trouble: swallow and try again
                            // next tick.
                            warn!(
                                job_id = %job.id,
                                handle = %handle,
                                "Video poll failed transiently: {}",
                                e
                            );
                        }
                    }
                }
            }
            Err(e) => {
                warn!(job_id = %job.id, "Video provider unavailable during poll: {}", e);
                for shot in job
                    .shots
                    .iter_mut()
                    .filter(|s| s.state == ShotState::PollingVideo)
                {
                    shot.fail(format!("Video provider unavailable: {}", e));
                }
            }
        }

        job.poll_attempts += 1;
        job.recompute_progress();
        self.jobs.commit(lease, job).await?;

        if job.shots.iter().all(|s| s.state.is_terminal()) {
            return self.finish_video_phase(lease, job).await;
        }
        Ok(StepOutcome::Rearm(self.config.poll_interval))
    }

    async fn finish_video_phase(
        &self,
        lease: &WriteLease,
        job: &mut Job,
    ) -> OrchestratorResult<StepOutcome> {
        let completed = job
            .shots
            .iter()
            .filter(|s| s.state == ShotState::Complete)
            .count();

        if completed == 0 {
            job.fail("All shots failed during video generation");
            self.jobs.commit(lease, job).await?;
            return Ok(StepOutcome::Terminal);
        }

        info!(
            job_id = %job.id,
            completed,
            failed = job.shots.len() - completed,
            "Video phase finished"
        );
        job.set_phase(JobPhase::VideosComplete);
        self.jobs.commit(lease, job).await?;
        Ok(StepOutcome::Advance)
    }

    // =========================================================================
    // Phase: VideosComplete -> Compiling | Complete
    // =========================================================================

    async fn leave_videos_complete(
        &self,
        lease: &WriteLease,
        job: &mut Job,
    ) -> OrchestratorResult<StepOutcome> {
        if !job.compile_enabled {
            // Per-shot clip URLs are the deliverable.
            job.complete();
            self.jobs.commit(lease, job).await?;
            info!(job_id = %job.id, "Job complete (no compile phase)");
            return Ok(StepOutcome::Terminal);
        }

        job.set_phase(JobPhase::Compiling);
        self.jobs.commit(lease, job).await?;
        Ok(StepOutcome::Advance)
    }

    // =========================================================================
    // Phase: Compiling
    // =========================================================================

    async fn drive_compile(
        &self,
        lease: &WriteLease,
        job: &mut Job,
    ) -> OrchestratorResult<StepOutcome> {
        let handle = match job.compile_request_id.clone() {
            Some(handle) => handle,
            None => return self.submit_compile(lease, job).await,
        };

        if job.compile_poll_attempts >= self.config.compile_poll_ceiling {
            warn!(
                job_id = %job.id,
                compile_poll_attempts = job.compile_poll_attempts,
                "Compile polling ceiling reached"
            );
            job.fail(format!("Timeout in {:?}", JobPhase::Compiling));
            self.jobs.commit(lease, job).await?;
            return Ok(StepOutcome::Terminal);
        }

        let compiler = match self
            .factory
            .compile(&job.owner_id, &job.providers.compile)
            .await
        {
            Ok(Some(compiler)) => compiler,
            Ok(None) => {
                job.complete();
                self.jobs.commit(lease, job).await?;
                return Ok(StepOutcome::Terminal);
            }
            Err(e) => {
                job.fail(format!("Compile provider unavailable: {}", e));
                self.jobs.commit(lease, job).await?;
                return Ok(StepOutcome::Terminal);
            }
        };

        match self
            .with_deadline("Compile poll", compiler.poll(&handle))
            .await
        {
            Ok(poll) => {
                use reel_providers::RemoteStatus;
                match poll.status {
                    RemoteStatus::Done => match poll.url {
                        Some(url) => {
                            job.final_artifact_url = Some(url);
                            job.complete();
                            self.jobs.commit(lease, job).await?;
                            info!(job_id = %job.id, "Job complete");
                            Ok(StepOutcome::Terminal)
                        }
                        None => {
                            job.fail("Compile finished without an output URL");
                            self.jobs.commit(lease, job).await?;
                            Ok(StepOutcome::Terminal)
                        }
                    },
                    RemoteStatus::Failed => {
                        job.fail(
                            poll.error
                                .unwrap_or_else(|| "Compilation failed".to_string()),
                        );
                        self.jobs.commit(lease, job).await?;
                        Ok(StepOutcome::Terminal)
                    }
                    RemoteStatus::Queued | RemoteStatus::Running => {
                        job.compile_poll_attempts += 1;
                        self.jobs.commit(lease, job).await?;
                        Ok(StepOutcome::Rearm(self.config.poll_interval))
                    }
                }
            }
            Err(e) => {
                warn!(job_id = %job.id, "Compile poll failed transiently: {}", e);
                job.compile_poll_attempts += 1;
                self.jobs.commit(lease, job).await?;
                Ok(StepOutcome::Rearm(self.config.poll_interval))
            }
        }
    }

    async fn submit_compile(
        &self,
        lease: &WriteLease,
        job: &mut Job,
    ) -> OrchestratorResult<StepOutcome> {
        let compiler = match self
            .factory
            .compile(&job.owner_id, &job.providers.compile)
            .await
        {
            Ok(Some(compiler)) => compiler,
            Ok(None) => {
                job.complete();
                self.jobs.commit(lease, job).await?;
                return Ok(StepOutcome::Terminal);
            }
            Err(e) => {
                job.fail(format!("Compile provider unavailable: {}", e));
                self.jobs.commit(lease, job).await?;
                return Ok(StepOutcome::Terminal);
            }
        };

        // Scene-then-shot order is the shot vector's order.
        let completed: Vec<&ShotJob> = job
            .shots
            .iter()
            .filter(|s| s.state == ShotState::Complete)
            .collect();
        let clip_urls: Vec<String> = completed
            .iter()
            .filter_map(|s| s.video_url.clone())
            .collect();
        let options = CompileOptions {
            transitions: completed.iter().map(|s| s.transition_out).collect(),
        };

        if clip_urls.is_empty() {
            job.fail("No clips available to compile");
            self.jobs.commit(lease, job).await?;
            return Ok(StepOutcome::Terminal);
        }

        let result = self
            .with_deadline(
                "Compile submission",
                compiler.submit(&clip_urls, job.aspect_ratio, &options),
            )
            .await;

        match result {
            Ok(handle) => {
                job.compile_request_id = Some(handle);
                job.compile_submit_attempts = 0;
                self.jobs.commit(lease, job).await?;
                Ok(StepOutcome::Rearm(self.config.poll_interval))
            }
            Err(e) if e.is_retryable() => {
                // No handle was recorded, so the next wake-up resubmits;
                // the persisted attempt counter bounds how often.
                job.compile_submit_attempts += 1;
                if job.compile_submit_attempts > self.config.retry_budget {
                    job.fail(format!(
                        "Compile submission failed after {} retries: {}",
                        self.config.retry_budget, e
                    ));
                    self.jobs.commit(lease, job).await?;
                    return Ok(StepOutcome::Terminal);
                }

                let delay = self.backoff.delay(job.compile_submit_attempts);
                warn!(
                    job_id = %job.id,
                    attempt = job.compile_submit_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Compile submission failed, will retry: {}",
                    e
                );
                self.jobs.commit(lease, job).await?;
                Ok(StepOutcome::Rearm(delay))
            }
            Err(e) => {
                job.fail(format!("Compile submission failed: {}", e));
                self.jobs.commit(lease, job).await?;
                Ok(StepOutcome::Terminal)
            }
        }
    }
}
