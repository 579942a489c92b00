//! Heimdall - Resilient vision analysis over remote multimodal models
//!
//! This crate turns stored images and decoded video frames into structured,
//! accessibility-oriented descriptions. Every request runs through the same
//! guarded path: a TTL cache keyed by a deterministic fingerprint, a
//! moderation gate that fails closed for minors, a circuit breaker and
//! retrying caller in front of the vision endpoint, and a validator that
//! salvages partial model output instead of discarding it.
//!
//! # Image Example
//!
//! ```rust,no_run
//! use heimdall::{AnalysisOptions, DetailLevel, Heimdall, Purpose};
//!
//! #[tokio::main]
//! async fn main() -> heimdall::Result<()> {
//!     let pipeline = Heimdall::builder()
//!         .library_root("/srv/media")
//!         .azure_openai("https://my-resource.openai.azure.com", "gpt-4o", "azure-key")
//!         .content_safety("https://my-safety.cognitiveservices.azure.com", "safety-key")
//!         .build()?;
//!
//!     let description = pipeline
//!         .analyze_images(
//!             vec!["products/mug.jpg".to_string()],
//!             AnalysisOptions::default()
//!                 .purpose(Purpose::Accessibility)
//!                 .detail(DetailLevel::Detailed),
//!         )
//!         .await?;
//!
//!     println!("{}", description.accessibility.alt_text);
//!     Ok(())
//! }
//! ```
//!
//! # Tuning Resilience
//!
//! ```rust
//! use std::time::Duration;
//! use heimdall::{BreakerConfig, CacheConfig, RetryConfig};
//!
//! let retry = RetryConfig::new().max_attempts(5).max_delay(Duration::from_secs(30));
//! let breaker = BreakerConfig::new().failure_threshold(3);
//! let cache = CacheConfig::new().ttl(Duration::from_secs(600));
//! # let _ = (retry, breaker, cache);
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod moderation;
pub mod pipeline;
pub mod prompt;
pub mod providers;
pub mod redact;
pub mod schema;
pub mod telemetry;
pub mod types;
pub mod validate;
pub mod version;

// Re-export main types at crate root
pub use cache::{AnalysisCache, CacheConfig};
pub use error::{ErrorKind, ErrorReport, FallbackStrategy, HeimdallError, Result};
pub use moderation::{GateDecision, ModerationPolicy};
pub use pipeline::{
    HealthReport, Heimdall, HeimdallBuilder, PipelineStats, StatsSnapshot, VideoConfig,
    VisionPipeline,
};
pub use providers::{
    BreakerConfig, BreakerState, ImageSource, ModerationProvider, RetryConfig, VisionProvider,
};
pub use schema::SCHEMA_VERSION;
pub use version::{PKG_VERSION, version_string};

// Re-export all types
pub use types::{
    AnalysisOptions, AnalysisRequest, Audience, DetailLevel, ImageData, Keyframe,
    ModerationResult, PassMode, Purpose, RecommendedAction, SafetyFlags, SceneSegment, Severity,
    StructuredDescription, TemporalAnalysis, Tone, VideoAnalysis, VideoFrame,
};
