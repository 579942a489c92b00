//! Shared mock collaborators for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use heimdall::prompt::ImageDetail;
use heimdall::providers::VisionRequest;
use heimdall::types::Confidence;
use heimdall::{
    BreakerConfig, CacheConfig, HeimdallBuilder, HeimdallError, ImageData, ImageSource,
    ModerationProvider, ModerationResult, RecommendedAction, Result, RetryConfig, SafetyFlags,
    SceneSegment, Severity, StructuredDescription, VideoAnalysis, VideoFrame, VisionProvider,
};

// ============================================================================
// Image source
// ============================================================================

/// In-memory library: ids `img-0`, `img-1`, ... map to tiny JPEG payloads.
pub struct MemoryImageSource {
    images: HashMap<String, ImageData>,
    loads: AtomicU32,
}

impl MemoryImageSource {
    pub fn with_images(count: usize) -> Self {
        let images = (0..count)
            .map(|i| (format!("img-{i}"), jpeg(i as u8)))
            .collect();
        Self {
            images,
            loads: AtomicU32::new(0),
        }
    }

    pub fn load_count(&self) -> u32 {
        self.loads.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ImageSource for MemoryImageSource {
    fn name(&self) -> &str {
        "memory"
    }

    async fn load(&self, id: &str) -> Result<ImageData> {
        self.loads.fetch_add(1, Ordering::Relaxed);
        self.images
            .get(id)
            .cloned()
            .ok_or_else(|| HeimdallError::ImageNotFound(id.to_string()))
    }
}

pub fn jpeg(seed: u8) -> ImageData {
    ImageData::new(vec![0xFF, 0xD8, 0xFF, seed], "image/jpeg")
}

pub fn ids(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("img-{i}")).collect()
}

pub fn frames(count: usize) -> Vec<VideoFrame> {
    (0..count)
        .map(|i| VideoFrame::new(i as f64, jpeg(i as u8)))
        .collect()
}

// ============================================================================
// Vision provider
// ============================================================================

type Responder = Box<dyn Fn(u32) -> Result<String> + Send + Sync>;

/// What one `complete` call was asked to do.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub image_count: usize,
    pub image_detail: ImageDetail,
    pub max_tokens: u32,
    pub user_prompt: String,
    pub schema_name: &'static str,
}

/// Vision provider answering from a closure over the 0-based call index.
pub struct ScriptedVision {
    responder: Responder,
    calls: AtomicU32,
    recorded: Mutex<Vec<RecordedCall>>,
    delay: Option<Duration>,
    probe_ok: bool,
}

impl ScriptedVision {
    pub fn new(responder: impl Fn(u32) -> Result<String> + Send + Sync + 'static) -> Self {
        Self {
            responder: Box::new(responder),
            calls: AtomicU32::new(0),
            recorded: Mutex::new(Vec::new()),
            delay: None,
            probe_ok: true,
        }
    }

    /// Always answer with the same raw text.
    pub fn always(raw: String) -> Self {
        Self::new(move |_| Ok(raw.clone()))
    }

    /// Always fail with the error built by `error`.
    pub fn failing(error: fn() -> HeimdallError) -> Self {
        Self::new(move |_| Err(error()))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn unreachable(mut self) -> Self {
        self.probe_ok = false;
        self
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn recorded(&self) -> Vec<RecordedCall> {
        self.recorded.lock().clone()
    }
}

#[async_trait]
impl VisionProvider for ScriptedVision {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "test-deployment"
    }

    fn api_version(&self) -> &str {
        "test-api"
    }

    async fn complete(&self, request: &VisionRequest<'_>) -> Result<String> {
        let index = self.calls.fetch_add(1, Ordering::Relaxed);
        self.recorded.lock().push(RecordedCall {
            image_count: request.images.len(),
            image_detail: request.prompt.image_detail,
            max_tokens: request.params.max_tokens,
            user_prompt: request.prompt.user.clone(),
            schema_name: request.prompt.schema_name,
        });
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.responder)(index)
    }

    async fn probe(&self) -> Result<()> {
        if self.probe_ok {
            Ok(())
        } else {
            Err(HeimdallError::Http("connection refused".into()))
        }
    }
}

// ============================================================================
// Moderation provider
// ============================================================================

/// Moderation provider returning a fixed verdict or failing.
pub struct MockModeration {
    verdict: Option<ModerationResult>,
    calls: AtomicU32,
    images_seen: AtomicU32,
}

impl MockModeration {
    pub fn allowing() -> Self {
        Self::returning(ModerationResult::allow())
    }

    pub fn returning(verdict: ModerationResult) -> Self {
        Self {
            verdict: Some(verdict),
            calls: AtomicU32::new(0),
            images_seen: AtomicU32::new(0),
        }
    }

    /// Classifier that is always down.
    pub fn unavailable() -> Self {
        Self {
            verdict: None,
            calls: AtomicU32::new(0),
            images_seen: AtomicU32::new(0),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn images_seen(&self) -> u32 {
        self.images_seen.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ModerationProvider for MockModeration {
    fn name(&self) -> &str {
        "mock-moderation"
    }

    async fn moderate(&self, images: &[ImageData]) -> Result<ModerationResult> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.images_seen
            .fetch_add(images.len() as u32, Ordering::Relaxed);
        self.verdict
            .clone()
            .ok_or_else(|| HeimdallError::Http("classifier unreachable".into()))
    }
}

/// Verdict with the given severity, flags and action.
pub fn verdict(
    safe: bool,
    severity: Severity,
    flags: SafetyFlags,
    action: RecommendedAction,
) -> ModerationResult {
    ModerationResult {
        safe,
        severity,
        flags,
        recommended_action: action,
        description: "mock verdict".to_string(),
    }
}

// ============================================================================
// Model output
// ============================================================================

/// A complete, strictly valid description.
pub fn description() -> StructuredDescription {
    let mut d = StructuredDescription::empty("en");
    d.metadata.confidence = Confidence::High;
    d.metadata.content_type = "photograph".into();
    d.accessibility.alt_text = "A red mug on a wooden desk".into();
    d.accessibility.long_description = "A glossy red ceramic mug sits on an oak desk.".into();
    d.accessibility.reading_level = "grade 6".into();
    d.content.primary_subjects = vec!["mug".into()];
    d.content.scene_description = "Home office desk".into();
    d.content.spatial_layout = "mug centred".into();
    d.generation.suggested_prompt = "red mug on oak desk, soft light".into();
    d
}

pub fn description_json() -> String {
    serde_json::to_string(&description()).unwrap()
}

/// A complete video analysis with the given segments and uncertainty notes.
pub fn video(segments: &[(f64, f64)], uncertainty: usize) -> VideoAnalysis {
    let mut analysis = VideoAnalysis::from_description(description());
    analysis.duration = 20.0;
    analysis.scene_segments = segments
        .iter()
        .map(|(start, end)| SceneSegment {
            start: *start,
            end: *end,
            description: format!("scene {start}-{end}"),
        })
        .collect();
    analysis.description.uncertainty_notes =
        (0..uncertainty).map(|i| format!("unclear {i}")).collect();
    analysis
}

pub fn video_json(segments: &[(f64, f64)], uncertainty: usize) -> String {
    serde_json::to_string(&video(segments, uncertainty)).unwrap()
}

// ============================================================================
// Pipeline helpers
// ============================================================================

/// Retry policy with no real waiting.
pub fn fast_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig::new()
        .max_attempts(max_attempts)
        .initial_delay(Duration::from_millis(1))
        .max_delay(Duration::from_millis(5))
        .jitter(false)
}

/// Builder wired to the given mocks with fast retries.
pub fn builder(
    images: Arc<MemoryImageSource>,
    vision: Arc<ScriptedVision>,
    moderation: Arc<MockModeration>,
) -> HeimdallBuilder {
    heimdall::Heimdall::builder()
        .image_source(images)
        .vision_provider(vision)
        .moderation_provider(moderation)
        .retry(fast_retry(3))
        .breaker(BreakerConfig::new().failure_threshold(5))
        .cache(CacheConfig::new())
}
