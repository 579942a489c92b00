//! Public types for the Heimdall API.

mod description;
mod image;
mod moderation;
mod options;
mod video;

pub use description::{
    Accessibility, Confidence, ContentDetails, DescriptionMetadata, GenerationGuidance,
    StructuredDescription, UNAVAILABLE,
};
pub use image::{
    ImageData, MAX_IMAGE_BYTES, SUPPORTED_MIME_TYPES, VideoFrame, mime_from_extension,
};
pub use moderation::{ModerationResult, RecommendedAction, SafetyFlags, Severity};
pub use options::{
    AnalysisOptions, AnalysisRequest, Audience, DetailLevel, MAX_IMAGES, MAX_QUESTIONS, PassMode,
    Purpose, Tone,
};
pub(crate) use options::validate_options;
pub use video::{Keyframe, SceneSegment, TemporalAnalysis, UNKNOWN, VideoAnalysis};
