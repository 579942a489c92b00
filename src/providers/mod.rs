//! Collaborator traits, their implementations, and resilience decorators.
//!
//! - [`traits`]: `ImageSource`, `VisionProvider`, `ModerationProvider`
//! - [`azure_vision`] / [`content_safety`]: HTTP clients
//! - [`fs`]: filesystem media library
//! - [`breaker`] / [`retry`] / [`guarded`]: failure handling around the
//!   remote vision call

pub mod azure_vision;
pub mod breaker;
pub mod content_safety;
pub mod fs;
pub mod guarded;
pub mod retry;
pub mod traits;

pub use azure_vision::AzureVisionClient;
pub use breaker::{BreakerConfig, BreakerPermit, BreakerSnapshot, BreakerState, CircuitBreaker};
pub use content_safety::ContentSafetyClient;
pub use fs::FsImageSource;
pub use guarded::GuardedVisionProvider;
pub use retry::{Attempt, RetryConfig, with_degradation, with_retry};
pub use traits::{CallParams, ImageSource, ModerationProvider, VisionProvider, VisionRequest};
