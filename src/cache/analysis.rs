//! Ephemeral cache of finished analyses.
//!
//! Successful results, blocked results and degraded fallbacks all land
//! under the same request key; they differ only in time-to-live. TTL is
//! tracked per entry via a moka [`Expiry`], so an overwrite always
//! restarts the clock with the new entry's TTL.
//!
//! The cache never fails: anything other than a live entry reads as a miss.

use std::time::{Duration, Instant};

use moka::Expiry;
use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use tracing::debug;

use crate::telemetry;
use crate::types::{StructuredDescription, VideoAnalysis};

/// Configuration for the analysis cache.
///
/// ```rust
/// # use heimdall::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .max_entries(5_000)
///     .ttl(Duration::from_secs(1800))
///     .blocked_ttl(Duration::from_secs(120));
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached entries. Default: 1,000.
    pub max_entries: u64,
    /// TTL for successful analyses. Default: 1 hour.
    pub ttl: Duration,
    /// TTL for moderation-blocked results. Default: 5 minutes.
    pub blocked_ttl: Duration,
    /// TTL for degraded fallbacks. Default: 1 minute.
    pub fallback_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1_000,
            ttl: Duration::from_secs(3600),
            blocked_ttl: Duration::from_secs(300),
            fallback_ttl: Duration::from_secs(60),
        }
    }
}

impl CacheConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of cached entries.
    pub fn max_entries(mut self, n: u64) -> Self {
        self.max_entries = n;
        self
    }

    /// Set the TTL for successful analyses.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the TTL for moderation-blocked results.
    pub fn blocked_ttl(mut self, ttl: Duration) -> Self {
        self.blocked_ttl = ttl;
        self
    }

    /// Set the TTL for degraded fallbacks.
    pub fn fallback_ttl(mut self, ttl: Duration) -> Self {
        self.fallback_ttl = ttl;
        self
    }
}

/// Cached value: an image description or a video analysis.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedAnalysis {
    Image(StructuredDescription),
    Video(VideoAnalysis),
}

#[derive(Clone)]
struct Entry {
    value: CachedAnalysis,
    ttl: Duration,
}

struct PerEntryTtl;

impl Expiry<String, Entry> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &Entry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Thread-safe TTL cache of analysis results, keyed on request fingerprint.
pub struct AnalysisCache {
    entries: Cache<String, Entry>,
}

impl AnalysisCache {
    /// Create a cache with the given configuration.
    ///
    /// A full cache always admits the new entry and evicts the least
    /// recently used one.
    pub fn new(config: &CacheConfig) -> Self {
        let entries = Cache::builder()
            .max_capacity(config.max_entries)
            .eviction_policy(EvictionPolicy::lru())
            .expire_after(PerEntryTtl)
            .build();
        Self { entries }
    }

    /// Look up a live entry. Emits cache hit/miss metrics.
    pub fn get(&self, key: &str) -> Option<CachedAnalysis> {
        match self.entries.get(key) {
            Some(entry) => {
                metrics::counter!(telemetry::CACHE_HITS_TOTAL).increment(1);
                debug!(key, "analysis cache hit");
                Some(entry.value)
            }
            None => {
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
                debug!(key, "analysis cache miss");
                None
            }
        }
    }

    /// Look up a cached image description. A video entry under the key is a miss.
    pub fn get_image(&self, key: &str) -> Option<StructuredDescription> {
        match self.get(key)? {
            CachedAnalysis::Image(description) => Some(description),
            CachedAnalysis::Video(_) => None,
        }
    }

    /// Look up a cached video analysis. An image entry under the key is a miss.
    pub fn get_video(&self, key: &str) -> Option<VideoAnalysis> {
        match self.get(key)? {
            CachedAnalysis::Video(analysis) => Some(analysis),
            CachedAnalysis::Image(_) => None,
        }
    }

    /// Insert (or overwrite) an entry that expires after `ttl`.
    pub fn set(&self, key: impl Into<String>, value: CachedAnalysis, ttl: Duration) {
        self.entries.insert(key.into(), Entry { value, ttl });
    }

    /// Number of entries currently held (after flushing pending maintenance).
    pub fn len(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evict all entries.
    pub fn clear(&self) {
        self.entries.invalidate_all();
    }
}

impl Default for AnalysisCache {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}
