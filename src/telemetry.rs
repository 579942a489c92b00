//! Telemetry metric name constants.
//!
//! Centralised metric names for heimdall operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `heimdall_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `operation`: public operation (`analyze_images`, `analyze_video`)
//! - `status`: outcome: "ok" or the error kind label
//! - `outcome`: moderation gate decision

/// Total analysis requests.
///
/// Labels: `operation`, `status` ("ok" | error kind).
pub const REQUESTS_TOTAL: &str = "heimdall_requests_total";

/// Request duration in seconds.
///
/// Labels: `operation`.
pub const REQUEST_DURATION_SECONDS: &str = "heimdall_request_duration_seconds";

/// Total retry attempts (not counting the initial call).
///
/// Labels: `provider`, `operation`.
pub const RETRIES_TOTAL: &str = "heimdall_retries_total";

/// Total results served from a degraded fallback.
///
/// Labels: `strategy`.
pub const FALLBACKS_TOTAL: &str = "heimdall_fallbacks_total";

/// Total cache hits.
pub const CACHE_HITS_TOTAL: &str = "heimdall_cache_hits_total";

/// Total cache misses.
pub const CACHE_MISSES_TOTAL: &str = "heimdall_cache_misses_total";

/// Circuit breaker state transitions.
///
/// Labels: `to` ("closed" | "open" | "half_open").
pub const BREAKER_TRANSITIONS_TOTAL: &str = "heimdall_breaker_transitions_total";

/// Moderation gate decisions.
///
/// Labels: `outcome` ("skipped" | "allowed" | "blocked" | "filtered" |
/// "fail_open" | "fail_closed").
pub const MODERATION_TOTAL: &str = "heimdall_moderation_total";

/// Model responses rebuilt by the salvage path.
pub const SALVAGED_TOTAL: &str = "heimdall_salvaged_total";

/// Video analyses that ran a second, targeted pass.
pub const SECOND_PASS_TOTAL: &str = "heimdall_second_pass_total";
