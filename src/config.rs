//! Configuration loading.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag)
//! 2. `~/.heimdall/config.toml` (user)
//! 3. `/etc/heimdall/config.toml` (system)
//!
//! Secrets are loaded separately with mandatory permission checks:
//! 1. `~/.heimdall/secrets.toml` (user, must be 0600)
//! 2. `/etc/heimdall/secrets.toml` (system, must be 0600)
//!
//! with `HEIMDALL_VISION_KEY` / `HEIMDALL_MODERATION_KEY` as fallbacks.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::CacheConfig;
use crate::moderation::ModerationPolicy;
use crate::pipeline::{HeimdallBuilder, VideoConfig};
use crate::providers::{BreakerConfig, RetryConfig};
use crate::{Heimdall, HeimdallError, Result};

/// Pipeline configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub vision: VisionConfig,
    #[serde(default)]
    pub moderation: ModerationConfig,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub retry: RetrySection,
    #[serde(default)]
    pub breaker: BreakerSection,
    #[serde(default)]
    pub video: VideoConfig,
    #[serde(default)]
    pub library: LibraryConfig,
}

/// Azure OpenAI deployment.
#[derive(Debug, Clone, Deserialize)]
pub struct VisionConfig {
    /// Resource endpoint, e.g. `https://my-resource.openai.azure.com`.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub deployment: Option<String>,
    #[serde(default)]
    pub api_version: Option<String>,
    /// Per-call timeout in seconds (default: 120).
    #[serde(default = "default_vision_timeout")]
    pub timeout_secs: u64,
    /// Sampling temperature (default: 0.2).
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            deployment: None,
            api_version: None,
            timeout_secs: default_vision_timeout(),
            temperature: default_temperature(),
            seed: None,
        }
    }
}

fn default_vision_timeout() -> u64 {
    120
}

fn default_temperature() -> f32 {
    0.2
}

/// Content Safety endpoint and adult policy.
#[derive(Debug, Clone, Deserialize)]
pub struct ModerationConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Block when the classifier fails (default: false).
    #[serde(default)]
    pub strict: bool,
    /// Proceed when the classifier fails, even in strict mode (default: true).
    #[serde(default = "default_true")]
    pub fail_open: bool,
    /// Per-call timeout in seconds (default: 30).
    #[serde(default = "default_moderation_timeout")]
    pub timeout_secs: u64,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            strict: false,
            fail_open: true,
            timeout_secs: default_moderation_timeout(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_moderation_timeout() -> u64 {
    30
}

/// Analysis cache sizing and lifetimes.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    #[serde(default = "default_max_entries")]
    pub max_entries: u64,
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,
    #[serde(default = "default_blocked_ttl")]
    pub blocked_ttl_secs: u64,
    #[serde(default = "default_fallback_ttl")]
    pub fallback_ttl_secs: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            ttl_secs: default_ttl(),
            blocked_ttl_secs: default_blocked_ttl(),
            fallback_ttl_secs: default_fallback_ttl(),
        }
    }
}

fn default_max_entries() -> u64 {
    1_000
}

fn default_ttl() -> u64 {
    3_600
}

fn default_blocked_ttl() -> u64 {
    300
}

fn default_fallback_ttl() -> u64 {
    60
}

/// Retry policy for the vision call.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySection {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_true")]
    pub jitter: bool,
    #[serde(default = "default_true")]
    pub allow_degradation: bool,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter: true,
            allow_degradation: true,
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    10_000
}

/// Circuit breaker thresholds.
#[derive(Debug, Clone, Deserialize)]
pub struct BreakerSection {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: u64,
}

impl Default for BreakerSection {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            cooldown_secs: default_cooldown(),
        }
    }
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_cooldown() -> u64 {
    30
}

/// Filesystem media library.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LibraryConfig {
    #[serde(default)]
    pub root: Option<PathBuf>,
}

impl From<&CacheSection> for CacheConfig {
    fn from(section: &CacheSection) -> Self {
        CacheConfig::new()
            .max_entries(section.max_entries)
            .ttl(Duration::from_secs(section.ttl_secs))
            .blocked_ttl(Duration::from_secs(section.blocked_ttl_secs))
            .fallback_ttl(Duration::from_secs(section.fallback_ttl_secs))
    }
}

impl From<&RetrySection> for RetryConfig {
    fn from(section: &RetrySection) -> Self {
        RetryConfig::new()
            .max_attempts(section.max_attempts)
            .initial_delay(Duration::from_millis(section.initial_delay_ms))
            .max_delay(Duration::from_millis(section.max_delay_ms))
            .jitter(section.jitter)
            .allow_degradation(section.allow_degradation)
    }
}

impl From<&BreakerSection> for BreakerConfig {
    fn from(section: &BreakerSection) -> Self {
        BreakerConfig::new()
            .failure_threshold(section.failure_threshold)
            .cooldown(Duration::from_secs(section.cooldown_secs))
    }
}

// ============================================================================
// Secrets
// ============================================================================

/// Secrets configuration (API keys).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Secrets {
    #[serde(default)]
    pub vision: Option<ApiKeySecret>,
    #[serde(default)]
    pub moderation: Option<ApiKeySecret>,
}

/// A single API key secret.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeySecret {
    pub api_key: String,
}

/// Service name → environment variable name mapping.
const SERVICE_ENV_VARS: &[(&str, &str)] = &[
    ("vision", "HEIMDALL_VISION_KEY"),
    ("moderation", "HEIMDALL_MODERATION_KEY"),
];

fn read_toml<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let content = fs::read_to_string(path).map_err(|e| {
        HeimdallError::Configuration(format!("Failed to read {what} file {path:?}: {e}"))
    })?;
    toml::from_str(&content).map_err(|e| {
        HeimdallError::Configuration(format!("Failed to parse {what} file {path:?}: {e}"))
    })
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided)
    /// 2. `~/.heimdall/config.toml`
    /// 3. `/etc/heimdall/config.toml`
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_config_path(explicit_path)?;
        read_toml(&path, "config")
    }

    /// Resolve the config file path.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
            return Err(HeimdallError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".heimdall").join("config.toml");
            if user_config.exists() {
                return Ok(user_config);
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/heimdall/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }

        Err(HeimdallError::Configuration(
            "No config file found. Create ~/.heimdall/config.toml or /etc/heimdall/config.toml"
                .to_string(),
        ))
    }

    /// Translate the file configuration into a pipeline builder.
    ///
    /// The vision endpoint, deployment and key must all be present.
    /// Moderation is wired only when both its endpoint and key exist.
    pub fn builder(&self, secrets: &Secrets) -> Result<HeimdallBuilder> {
        let endpoint = self.vision.endpoint.as_deref().ok_or_else(|| {
            HeimdallError::Configuration("[vision] endpoint is required".into())
        })?;
        let deployment = self.vision.deployment.as_deref().ok_or_else(|| {
            HeimdallError::Configuration("[vision] deployment is required".into())
        })?;
        let key = secrets.api_key("vision").ok_or_else(|| {
            HeimdallError::Configuration(
                "no vision API key: set [vision] api_key in secrets.toml or HEIMDALL_VISION_KEY"
                    .into(),
            )
        })?;

        let mut builder = Heimdall::builder()
            .azure_openai(endpoint, deployment, key)
            .timeout(Duration::from_secs(self.vision.timeout_secs))
            .temperature(self.vision.temperature)
            .moderation_policy(ModerationPolicy {
                strict: self.moderation.strict,
                fail_open: self.moderation.fail_open,
            })
            .moderation_timeout(Duration::from_secs(self.moderation.timeout_secs))
            .cache((&self.cache).into())
            .retry((&self.retry).into())
            .breaker((&self.breaker).into())
            .video(self.video.clone());

        if let Some(version) = &self.vision.api_version {
            builder = builder.azure_api_version(version);
        }
        if let Some(seed) = self.vision.seed {
            builder = builder.seed(seed);
        }
        if let (Some(endpoint), Some(key)) =
            (&self.moderation.endpoint, secrets.api_key("moderation"))
        {
            builder = builder.content_safety(endpoint, key);
        }
        if let Some(root) = &self.library.root {
            builder = builder.library_root(root);
        }
        Ok(builder)
    }
}

impl Secrets {
    /// Load secrets from the standard locations with permission checks.
    ///
    /// Resolution order:
    /// 1. `~/.heimdall/secrets.toml` (if exists, must be 0600)
    /// 2. `/etc/heimdall/secrets.toml` (if exists, must be 0600)
    ///
    /// Returns empty secrets if no file exists (keys may come from env vars).
    pub fn load() -> Result<Self> {
        if let Some(home) = dirs::home_dir() {
            let user_secrets = home.join(".heimdall").join("secrets.toml");
            if user_secrets.exists() {
                return Self::load_from(&user_secrets);
            }
        }

        let system_secrets = PathBuf::from("/etc/heimdall/secrets.toml");
        if system_secrets.exists() {
            return Self::load_from(&system_secrets);
        }

        Ok(Secrets::default())
    }

    /// Load a specific secrets file, enforcing owner-only permissions.
    pub fn load_from(path: &Path) -> Result<Self> {
        Self::check_permissions(path)?;
        read_toml(path, "secrets")
    }

    /// Check that the secrets file has secure permissions (0600 or 0400).
    #[cfg(unix)]
    fn check_permissions(path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let metadata = fs::metadata(path).map_err(|e| {
            HeimdallError::Configuration(format!("Failed to stat secrets file {path:?}: {e}"))
        })?;

        let mode = metadata.permissions().mode();
        if mode & 0o077 != 0 {
            return Err(HeimdallError::Configuration(format!(
                "Secrets file {path:?} has insecure permissions {:o}. Must be 0600 or 0400.",
                mode & 0o777
            )));
        }

        Ok(())
    }

    #[cfg(not(unix))]
    fn check_permissions(_path: &Path) -> Result<()> {
        Ok(())
    }

    /// Get the API key for a service, falling back to its environment variable.
    pub fn api_key(&self, service: &str) -> Option<String> {
        let from_file = match service {
            "vision" => self.vision.as_ref(),
            "moderation" => self.moderation.as_ref(),
            _ => None,
        }
        .map(|s| s.api_key.clone());

        from_file.or_else(|| {
            SERVICE_ENV_VARS
                .iter()
                .find(|(name, _)| *name == service)
                .and_then(|(_, env_var)| std::env::var(env_var).ok())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let config = Config::default();
        assert_eq!(config.vision.timeout_secs, 120);
        assert!(!config.moderation.strict);
        assert!(config.moderation.fail_open);
        assert_eq!(config.cache.ttl_secs, 3_600);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.breaker.failure_threshold, 5);
        assert_eq!(config.video.two_pass_threshold, 10);
    }

    #[test]
    fn parse_minimal_config() {
        let toml = r#"
            [vision]
            endpoint = "https://example.openai.azure.com"
            deployment = "gpt-4o"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.vision.deployment.as_deref(), Some("gpt-4o"));
        // Defaults preserved
        assert_eq!(config.cache.blocked_ttl_secs, 300);
        assert_eq!(config.breaker.cooldown_secs, 30);
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
            [vision]
            endpoint = "https://example.openai.azure.com"
            deployment = "gpt-4o"
            api_version = "2025-01-01-preview"
            timeout_secs = 60
            seed = 7

            [moderation]
            endpoint = "https://example.cognitiveservices.azure.com"
            strict = true
            fail_open = false

            [cache]
            max_entries = 50
            ttl_secs = 10

            [retry]
            max_attempts = 5
            jitter = false

            [breaker]
            failure_threshold = 2

            [video]
            two_pass_threshold = 4

            [library]
            root = "/srv/media"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.vision.timeout_secs, 60);
        assert_eq!(config.vision.seed, Some(7));
        assert!(config.moderation.strict && !config.moderation.fail_open);
        assert_eq!(config.cache.max_entries, 50);
        assert_eq!(config.cache.fallback_ttl_secs, 60);
        assert_eq!(config.retry.max_attempts, 5);
        assert!(!config.retry.jitter);
        assert_eq!(config.breaker.failure_threshold, 2);
        assert_eq!(config.video.two_pass_threshold, 4);
        assert_eq!(config.video.overview_frames, 8);
        assert_eq!(config.library.root, Some(PathBuf::from("/srv/media")));

        let retry: RetryConfig = (&config.retry).into();
        assert_eq!(retry.max_attempts, 5);
        assert_eq!(retry.initial_delay, Duration::from_secs(1));
    }

    #[test]
    fn parse_secrets() {
        let toml = r#"
            [vision]
            api_key = "vision-test-key"
        "#;
        let secrets: Secrets = toml::from_str(toml).unwrap();
        assert_eq!(secrets.vision.as_ref().unwrap().api_key, "vision-test-key");
        assert!(secrets.moderation.is_none());
    }

    #[test]
    fn api_key_from_secrets() {
        let secrets = Secrets {
            vision: Some(ApiKeySecret {
                api_key: "from-file".to_string(),
            }),
            ..Default::default()
        };
        assert_eq!(secrets.api_key("vision"), Some("from-file".to_string()));
        assert_eq!(secrets.api_key("unknown"), None);
    }

    #[test]
    fn builder_requires_vision_endpoint() {
        let secrets = Secrets {
            vision: Some(ApiKeySecret {
                api_key: "k".into(),
            }),
            ..Default::default()
        };
        let err = Config::default().builder(&secrets).err().unwrap();
        assert!(matches!(err, HeimdallError::Configuration(_)));
    }
}
