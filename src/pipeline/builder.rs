//! Builder for configuring pipeline instances

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::{PipelineStats, VideoConfig, VisionPipeline};
use crate::cache::{AnalysisCache, CacheConfig, KeyContext};
use crate::moderation::{ModerationGate, ModerationPolicy};
use crate::providers::{
    AzureVisionClient, BreakerConfig, CallParams, CircuitBreaker, ContentSafetyClient,
    FsImageSource, GuardedVisionProvider, ImageSource, ModerationProvider, RetryConfig,
    VisionProvider,
};
use crate::schema::SCHEMA_VERSION;
use crate::{HeimdallError, Result};

/// Main entry point for creating pipeline instances.
pub struct Heimdall;

impl Heimdall {
    /// Create a new builder for configuring the pipeline.
    pub fn builder() -> HeimdallBuilder {
        HeimdallBuilder::new()
    }
}

struct AzureVisionSettings {
    endpoint: String,
    deployment: String,
    api_key: String,
    api_version: Option<String>,
}

struct ContentSafetySettings {
    endpoint: String,
    api_key: String,
}

/// Builder for configuring pipeline instances.
///
/// An image source and a vision provider are required; everything else
/// has a default.
pub struct HeimdallBuilder {
    image_source: Option<Arc<dyn ImageSource>>,
    library_root: Option<PathBuf>,
    vision: Option<Arc<dyn VisionProvider>>,
    azure_vision: Option<AzureVisionSettings>,
    moderation: Option<Arc<dyn ModerationProvider>>,
    content_safety: Option<ContentSafetySettings>,
    moderation_policy: ModerationPolicy,
    moderation_timeout: Duration,
    cache: CacheConfig,
    retry: RetryConfig,
    breaker: BreakerConfig,
    video: VideoConfig,
    call: CallParams,
    stats: Option<Arc<PipelineStats>>,
}

impl HeimdallBuilder {
    pub fn new() -> Self {
        Self {
            image_source: None,
            library_root: None,
            vision: None,
            azure_vision: None,
            moderation: None,
            content_safety: None,
            moderation_policy: ModerationPolicy::default(),
            moderation_timeout: Duration::from_secs(30),
            cache: CacheConfig::default(),
            retry: RetryConfig::default(),
            breaker: BreakerConfig::default(),
            video: VideoConfig::default(),
            call: CallParams::default(),
            stats: None,
        }
    }

    /// Use a custom image source.
    pub fn image_source(mut self, source: Arc<dyn ImageSource>) -> Self {
        self.image_source = Some(source);
        self
    }

    /// Resolve image ids as paths under `root`.
    pub fn library_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.library_root = Some(root.into());
        self
    }

    /// Use a custom vision provider.
    pub fn vision_provider(mut self, provider: Arc<dyn VisionProvider>) -> Self {
        self.vision = Some(provider);
        self
    }

    /// Configure an Azure OpenAI deployment as the vision provider.
    pub fn azure_openai(
        mut self,
        endpoint: impl Into<String>,
        deployment: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        self.azure_vision = Some(AzureVisionSettings {
            endpoint: endpoint.into(),
            deployment: deployment.into(),
            api_key: api_key.into(),
            api_version: None,
        });
        self
    }

    /// Override the Azure OpenAI API version.
    pub fn azure_api_version(mut self, api_version: impl Into<String>) -> Self {
        if let Some(settings) = self.azure_vision.as_mut() {
            settings.api_version = Some(api_version.into());
        }
        self
    }

    /// Use a custom moderation provider.
    pub fn moderation_provider(mut self, provider: Arc<dyn ModerationProvider>) -> Self {
        self.moderation = Some(provider);
        self
    }

    /// Configure Azure AI Content Safety as the moderation provider.
    pub fn content_safety(mut self, endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        self.content_safety = Some(ContentSafetySettings {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        });
        self
    }

    /// Set the adult moderation policy. Minors always fail closed.
    pub fn moderation_policy(mut self, policy: ModerationPolicy) -> Self {
        self.moderation_policy = policy;
        self
    }

    /// Wall-clock limit for one moderation call (default: 30s).
    pub fn moderation_timeout(mut self, timeout: Duration) -> Self {
        self.moderation_timeout = timeout;
        self
    }

    pub fn cache(mut self, config: CacheConfig) -> Self {
        self.cache = config;
        self
    }

    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = config;
        self
    }

    pub fn breaker(mut self, config: BreakerConfig) -> Self {
        self.breaker = config;
        self
    }

    pub fn video(mut self, config: VideoConfig) -> Self {
        self.video = config;
        self
    }

    /// Wall-clock limit for one vision call (default: 120s).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.call.timeout = timeout;
        self
    }

    /// Sampling temperature (default: 0.2).
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.call.temperature = temperature;
        self
    }

    /// Deterministic sampling seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.call.seed = Some(seed);
        self
    }

    /// Share a stats instance instead of creating a fresh one.
    pub fn stats(mut self, stats: Arc<PipelineStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Build the pipeline.
    pub fn build(self) -> Result<VisionPipeline> {
        let images: Arc<dyn ImageSource> = match (self.image_source, self.library_root) {
            (Some(source), _) => source,
            (None, Some(root)) => Arc::new(FsImageSource::new(root)),
            (None, None) => {
                return Err(HeimdallError::Configuration(
                    "no image source configured".into(),
                ));
            }
        };

        let vision: Arc<dyn VisionProvider> = match (self.vision, self.azure_vision) {
            (Some(provider), _) => provider,
            (None, Some(settings)) => {
                let mut client =
                    AzureVisionClient::new(settings.endpoint, settings.deployment, settings.api_key)?;
                if let Some(version) = settings.api_version {
                    client = client.with_api_version(version);
                }
                Arc::new(client)
            }
            (None, None) => {
                return Err(HeimdallError::Configuration(
                    "no vision provider configured".into(),
                ));
            }
        };

        let moderation: Option<Arc<dyn ModerationProvider>> =
            match (self.moderation, self.content_safety) {
                (Some(provider), _) => Some(provider),
                (None, Some(settings)) => Some(Arc::new(ContentSafetyClient::new(
                    settings.endpoint,
                    settings.api_key,
                )?)),
                (None, None) => None,
            };

        let key_context = KeyContext {
            model: vision.model().to_string(),
            api_version: vision.api_version().to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
        };
        let breaker = Arc::new(CircuitBreaker::new(vision.name(), self.breaker));

        Ok(VisionPipeline {
            images,
            vision: GuardedVisionProvider::new(vision, breaker),
            gate: ModerationGate::new(moderation, self.moderation_policy, self.moderation_timeout),
            cache: AnalysisCache::new(&self.cache),
            cache_config: self.cache,
            retry: self.retry,
            video: self.video,
            call: self.call,
            stats: self.stats.unwrap_or_default(),
            key_context,
        })
    }
}

impl Default for HeimdallBuilder {
    fn default() -> Self {
        Self::new()
    }
}
