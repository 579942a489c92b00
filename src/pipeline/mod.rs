//! The vision analysis pipeline.
//!
//! [`VisionPipeline`] owns the shared state (cache, breaker, stats) and
//! runs each request through the same stages:
//!
//! ```text
//! validate → cache lookup → load images → moderation gate → prompt
//!          → breaker-guarded retrying call → validate/salvage
//!          → merge moderation flags + redact PII → cache store
//! ```
//!
//! Video requests branch into single- or two-pass orchestration before the
//! shared tail. Construct one with [`Heimdall::builder()`](crate::Heimdall::builder).

mod builder;
pub mod health;
pub mod stats;
pub mod video;

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use futures_util::future::try_join_all;
use tracing::{debug, info, warn};

pub use builder::{Heimdall, HeimdallBuilder};
pub use health::{EndpointHealth, HealthDetails, HealthReport};
pub use stats::{PipelineStats, StatsSnapshot};
pub use video::VideoConfig;

use crate::cache::{AnalysisCache, CacheConfig, CachedAnalysis, KeyContext, image_key, video_key};
use crate::error::FallbackStrategy;
use crate::moderation::{GateDecision, ModerationGate};
use crate::prompt::{self, ImageDetail, VisionPrompt};
use crate::providers::{
    Attempt, CallParams, GuardedVisionProvider, ImageSource, RetryConfig, VisionProvider,
    VisionRequest, with_degradation,
};
use crate::redact::{redact_description, redact_video};
use crate::telemetry;
use crate::types::{
    AnalysisOptions, AnalysisRequest, DetailLevel, ImageData, ModerationResult,
    StructuredDescription, VideoAnalysis, VideoFrame, validate_options,
};
use crate::validate;
use crate::{HeimdallError, Result, version};

/// Resilient vision analysis over an image source, a vision endpoint and
/// a moderation classifier.
pub struct VisionPipeline {
    images: Arc<dyn ImageSource>,
    vision: GuardedVisionProvider,
    gate: ModerationGate,
    cache: AnalysisCache,
    cache_config: CacheConfig,
    retry: RetryConfig,
    video: VideoConfig,
    call: CallParams,
    stats: Arc<PipelineStats>,
    key_context: KeyContext,
}

impl VisionPipeline {
    /// Describe an ordered set of 1 to 10 stored images.
    pub async fn analyze_images(
        &self,
        image_ids: Vec<String>,
        options: AnalysisOptions,
    ) -> Result<StructuredDescription> {
        self.instrumented("analyze_images", async {
            let request = AnalysisRequest::new(image_ids, options)?;
            self.run_images(&request).await
        })
        .await
    }

    /// Describe a video from its decoded frames.
    pub async fn analyze_video_frames(
        &self,
        video_id: &str,
        frames: Vec<VideoFrame>,
        options: AnalysisOptions,
    ) -> Result<VideoAnalysis> {
        self.instrumented("analyze_video", self.run_video(video_id, frames, options))
            .await
    }

    /// Probe the endpoint and report cache, breaker and request stats.
    pub async fn health_check(&self) -> HealthReport {
        let started = Instant::now();
        let probe = tokio::time::timeout(self.call.timeout, self.vision.probe())
            .await
            .map_err(|_| HeimdallError::Timeout(self.call.timeout))
            .and_then(|r| r);
        if let Err(e) = &probe {
            warn!(error = %e, "vision endpoint probe failed");
        }
        HealthReport::new(HealthDetails {
            version: version::version_string(),
            endpoint: EndpointHealth {
                provider: self.vision.name().to_string(),
                model: self.vision.model().to_string(),
                reachable: probe.is_ok(),
                latency_ms: started.elapsed().as_secs_f64() * 1_000.0,
                error: probe.err().map(|e| e.to_string()),
            },
            cache_entries: self.cache.len(),
            breaker: self.vision.breaker().snapshot(),
            stats: self.stats.snapshot(),
        })
    }

    /// Shared stats instance.
    pub fn stats(&self) -> &Arc<PipelineStats> {
        &self.stats
    }

    pub fn cache(&self) -> &AnalysisCache {
        &self.cache
    }

    // ========================================================================
    // Image flow
    // ========================================================================

    async fn run_images(&self, request: &AnalysisRequest) -> Result<StructuredDescription> {
        let options = request.options();
        let language = options.language.as_str();
        let key = image_key(request.image_ids(), options, &self.key_context)?;

        if let Some(hit) = self.lookup(&key, options, AnalysisCache::get_image) {
            return Ok(hit);
        }

        let images = self.load_images(request.image_ids()).await?;
        let decision = self.gate.check(&images, options).await?;
        if let GateDecision::Blocked(verdict) = &decision {
            let blocked = StructuredDescription::blocked(language, verdict);
            self.store(key, CachedAnalysis::Image(blocked.clone()), self.cache_config.blocked_ttl);
            return Ok(blocked);
        }

        let prompt = prompt::image_prompt(options, images.len());
        let raw = match self.call_vision(&prompt, &images, options.detail).await? {
            Attempt::Completed(raw) => raw,
            Attempt::Degraded { strategy, cause } => {
                let fallback = fallback_description(strategy, language, &cause);
                self.stats.record_degraded();
                self.store(key, CachedAnalysis::Image(fallback.clone()), self.cache_config.fallback_ttl);
                return Ok(fallback);
            }
        };

        let mut description = validate::parse_description(&raw, language)?;
        finish(&mut description, &decision);
        self.store(key, CachedAnalysis::Image(description.clone()), self.cache_config.ttl);
        Ok(description)
    }

    async fn load_images(&self, ids: &[String]) -> Result<Vec<ImageData>> {
        try_join_all(ids.iter().map(|id| async move {
            let image = self.images.load(id).await?;
            image.validate()?;
            Ok::<_, HeimdallError>(image)
        }))
        .await
    }

    // ========================================================================
    // Video flow
    // ========================================================================

    async fn run_video(
        &self,
        video_id: &str,
        mut frames: Vec<VideoFrame>,
        options: AnalysisOptions,
    ) -> Result<VideoAnalysis> {
        self.validate_video(video_id, &frames, &options)?;
        frames.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        let language = options.language.as_str();
        let key = video_key(video_id, &frames, &options, &self.key_context)?;

        if let Some(hit) = self.lookup(&key, &options, AnalysisCache::get_video) {
            return Ok(hit);
        }

        // Moderation covers every frame, not just the sampled ones.
        let all_images: Vec<ImageData> = frames.iter().map(|f| f.image.clone()).collect();
        let decision = self.gate.check(&all_images, &options).await?;
        if let GateDecision::Blocked(verdict) = &decision {
            let blocked = VideoAnalysis::blocked(language, verdict);
            self.store(key, CachedAnalysis::Video(blocked.clone()), self.cache_config.blocked_ttl);
            return Ok(blocked);
        }

        let (outcome, ttl) = if self.video.use_two_pass(options.pass_mode, frames.len()) {
            match self.two_pass(&frames, &options).await? {
                TwoPass::Full(outcome) => (outcome, self.cache_config.ttl),
                // Overview-only results get the fallback TTL.
                TwoPass::OverviewOnly(analysis) => {
                    (Attempt::Completed(analysis), self.cache_config.fallback_ttl)
                }
            }
        } else {
            let all: Vec<&VideoFrame> = frames.iter().collect();
            let detail = prompt::image_detail_for(options.detail);
            (self.video_pass(&all, &options, detail).await?, self.cache_config.ttl)
        };

        let mut analysis = match outcome {
            Attempt::Completed(analysis) => analysis,
            Attempt::Degraded { strategy, cause } => {
                let fallback =
                    VideoAnalysis::from_description(fallback_description(strategy, language, &cause));
                self.stats.record_degraded();
                self.store(key, CachedAnalysis::Video(fallback.clone()), self.cache_config.fallback_ttl);
                return Ok(fallback);
            }
        };

        analysis.description.merge_safety_flags(&decision.flags());
        redact_video(&mut analysis);
        self.store(key, CachedAnalysis::Video(analysis.clone()), ttl);
        Ok(analysis)
    }

    fn validate_video(
        &self,
        video_id: &str,
        frames: &[VideoFrame],
        options: &AnalysisOptions,
    ) -> Result<()> {
        validate_options(options)?;
        if video_id.trim().is_empty() {
            return Err(HeimdallError::InvalidInput("video id must not be empty".into()));
        }
        if frames.is_empty() {
            return Err(HeimdallError::InvalidInput("at least one frame is required".into()));
        }
        if frames.len() > self.video.max_frames {
            return Err(HeimdallError::InvalidInput(format!(
                "{} frames supplied, limit is {}",
                frames.len(),
                self.video.max_frames
            )));
        }
        for frame in frames {
            if !frame.timestamp.is_finite() || frame.timestamp < 0.0 {
                return Err(HeimdallError::InvalidInput(format!(
                    "invalid frame timestamp {}",
                    frame.timestamp
                )));
            }
            frame.image.validate()?;
        }
        Ok(())
    }

    async fn two_pass(
        &self,
        frames: &[VideoFrame],
        options: &AnalysisOptions,
    ) -> Result<TwoPass> {
        let overview = self.video.overview_sample(frames);
        debug!(total = frames.len(), sampled = overview.len(), "video pass 1");
        let mut pass1 = match self
            .video_pass(&overview, &video::overview_options(options), ImageDetail::Low)
            .await?
        {
            Attempt::Completed(analysis) => analysis,
            degraded => return Ok(TwoPass::Full(degraded)),
        };

        if !self.video.needs_second_pass(&pass1, options) {
            debug!(
                uncertainty = pass1.description.uncertainty_notes.len(),
                "second pass not needed"
            );
            return Ok(TwoPass::Full(Attempt::Completed(pass1)));
        }

        let targeted = self.video.segment_sample(frames, &pass1.scene_segments);
        if targeted.is_empty() {
            debug!("no frames inside pass-1 segments, skipping second pass");
            pass1
                .description
                .note("second pass skipped: no frames inside the reported segments");
            return Ok(TwoPass::Full(Attempt::Completed(pass1)));
        }

        metrics::counter!(telemetry::SECOND_PASS_TOTAL).increment(1);
        debug!(frames = targeted.len(), "video pass 2");
        let pass2_options = video::segment_options(options);
        let detail = prompt::image_detail_for(pass2_options.detail);
        match self.video_pass(&targeted, &pass2_options, detail).await {
            Ok(Attempt::Completed(pass2)) => Ok(TwoPass::Full(Attempt::Completed(
                video::merge_passes(pass1, pass2),
            ))),
            Ok(Attempt::Degraded { cause, .. }) => {
                warn!(error = %cause, "second pass unavailable, keeping overview");
                pass1
                    .description
                    .note(format!("second pass failed, overview only: {cause}"));
                Ok(TwoPass::OverviewOnly(pass1))
            }
            Err(e @ (HeimdallError::ContentFiltered { .. } | HeimdallError::Moderation { .. })) => {
                Err(e)
            }
            Err(e) => {
                warn!(error = %e, "second pass failed, keeping overview");
                pass1
                    .description
                    .note(format!("second pass failed, overview only: {e}"));
                Ok(TwoPass::OverviewOnly(pass1))
            }
        }
    }

    async fn video_pass(
        &self,
        frames: &[&VideoFrame],
        options: &AnalysisOptions,
        image_detail: ImageDetail,
    ) -> Result<Attempt<VideoAnalysis>> {
        let timestamps: Vec<f64> = frames.iter().map(|f| f.timestamp).collect();
        let images: Vec<ImageData> = frames.iter().map(|f| f.image.clone()).collect();
        let prompt = prompt::video_prompt(options, &timestamps, image_detail);
        match self.call_vision(&prompt, &images, options.detail).await? {
            Attempt::Completed(raw) => Ok(Attempt::Completed(validate::parse_video(
                &raw,
                &options.language,
            )?)),
            Attempt::Degraded { strategy, cause } => Ok(Attempt::Degraded { strategy, cause }),
        }
    }

    // ========================================================================
    // Shared stages
    // ========================================================================

    fn lookup<T>(
        &self,
        key: &str,
        options: &AnalysisOptions,
        get: impl Fn(&AnalysisCache, &str) -> Option<T>,
    ) -> Option<T> {
        if options.force_refresh {
            debug!(key, "force refresh, skipping cache lookup");
            return None;
        }
        match get(&self.cache, key) {
            Some(hit) => {
                self.stats.record_cache_hit();
                Some(hit)
            }
            None => {
                self.stats.record_cache_miss();
                None
            }
        }
    }

    fn store(&self, key: String, value: CachedAnalysis, ttl: std::time::Duration) {
        self.cache.set(key, value, ttl);
    }

    async fn call_vision(
        &self,
        prompt: &VisionPrompt,
        images: &[ImageData],
        detail: DetailLevel,
    ) -> Result<Attempt<String>> {
        let params = CallParams {
            max_tokens: prompt::max_tokens(detail),
            ..self.call.clone()
        };
        let request = VisionRequest {
            prompt,
            images,
            params: &params,
        };
        let request = &request;
        let vision = &self.vision;
        with_degradation(&self.retry, vision.name(), "complete", move || {
            vision.complete(request)
        })
        .await
    }

    async fn instrumented<T, Fut>(&self, operation: &'static str, fut: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        let started = Instant::now();
        let result = fut.await;
        let elapsed = started.elapsed();
        match &result {
            Ok(_) => {
                self.stats.record_success(operation, elapsed);
                info!(operation, elapsed_ms = elapsed.as_millis() as u64, "analysis complete");
            }
            Err(e) => {
                self.stats.record_failure(operation, e.kind(), elapsed);
                if e.is_transient() {
                    warn!(operation, error = %e, kind = e.kind().as_str(), "analysis failed");
                } else {
                    info!(operation, error = %e, kind = e.kind().as_str(), "analysis rejected");
                }
            }
        }
        result
    }
}

/// Result of two-pass orchestration.
enum TwoPass {
    /// Pass 1 alone sufficed, both passes merged, or pass 1 itself degraded.
    Full(Attempt<VideoAnalysis>),
    /// Pass 2 was needed but failed; only the overview is available.
    OverviewOnly(VideoAnalysis),
}

/// Merge the gate's flags into the model's and scrub PII.
fn finish(description: &mut StructuredDescription, decision: &GateDecision) {
    description.merge_safety_flags(&decision.flags());
    redact_description(description);
}

fn fallback_description(
    strategy: FallbackStrategy,
    language: &str,
    cause: &HeimdallError,
) -> StructuredDescription {
    match strategy {
        FallbackStrategy::Generic => StructuredDescription::degraded(language, &cause.to_string()),
        FallbackStrategy::Blocked => StructuredDescription::blocked(
            language,
            &ModerationResult {
                safe: false,
                description: cause.to_string(),
                ..ModerationResult::default()
            },
        ),
    }
}
