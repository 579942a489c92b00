//! Collaborator traits at the pipeline's seams.
//!
//! The pipeline talks to three external collaborators, each behind its own
//! capability trait rather than a single "god trait":
//!
//! - [`ImageSource`]: resolves opaque image ids to bytes (the media library)
//! - [`VisionProvider`]: the paid multimodal inference call
//! - [`ModerationProvider`]: the external safety classifier
//!
//! Decorators such as [`GuardedVisionProvider`](super::GuardedVisionProvider)
//! wrap these traits to add circuit breaking and timeouts.

use std::time::Duration;

use async_trait::async_trait;

use crate::Result;
use crate::prompt::VisionPrompt;
use crate::types::{ImageData, ModerationResult};

// ============================================================================
// Image Source
// ============================================================================

/// Resolves opaque image identifiers to image bytes.
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Source name for logging/debugging.
    fn name(&self) -> &str;

    /// Load one image. Returns `ImageNotFound` for unknown ids.
    async fn load(&self, id: &str) -> Result<ImageData>;
}

// ============================================================================
// Vision Provider
// ============================================================================

/// Sampling and transport parameters for one remote vision call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallParams {
    pub max_tokens: u32,
    pub temperature: f32,
    /// Deterministic sampling seed, when the deployment supports one.
    pub seed: Option<u64>,
    /// Wall-clock limit for the call.
    pub timeout: Duration,
}

impl Default for CallParams {
    fn default() -> Self {
        Self {
            max_tokens: 2_000,
            temperature: 0.2,
            seed: None,
            timeout: Duration::from_secs(120),
        }
    }
}

/// Everything a provider needs for one structured-output call.
#[derive(Debug, Clone, Copy)]
pub struct VisionRequest<'a> {
    pub prompt: &'a VisionPrompt,
    pub images: &'a [ImageData],
    pub params: &'a CallParams,
}

/// Remote multimodal model returning structured output as text.
#[async_trait]
pub trait VisionProvider: Send + Sync {
    /// Provider name for logging/debugging.
    fn name(&self) -> &str;

    /// Model or deployment identifier. Participates in cache keys.
    fn model(&self) -> &str;

    /// API version spoken to the endpoint. Participates in cache keys.
    fn api_version(&self) -> &str;

    /// Run one inference call and return the raw model output.
    async fn complete(&self, request: &VisionRequest<'_>) -> Result<String>;

    /// Lightweight reachability check for health reporting.
    async fn probe(&self) -> Result<()>;
}

// ============================================================================
// Moderation Provider
// ============================================================================

/// External content-safety classifier.
#[async_trait]
pub trait ModerationProvider: Send + Sync {
    /// Provider name for logging/debugging.
    fn name(&self) -> &str;

    /// Classify a set of images, returning one combined verdict.
    async fn moderate(&self, images: &[ImageData]) -> Result<ModerationResult>;
}
