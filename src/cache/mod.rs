//! Caching subsystem.
//!
//! - [`AnalysisCache`]: TTL cache of finished analyses, shared by every
//!   request a pipeline serves. See [`analysis`] for TTL semantics.
//! - [`key`]: deterministic request fingerprints used as cache keys.

pub mod analysis;
pub mod key;

pub use analysis::{AnalysisCache, CacheConfig, CachedAnalysis};
pub use key::{KeyContext, image_key, video_key};
