//! Heimdall error types

use std::time::Duration;

use serde::Serialize;

/// What the pipeline should hand back when an error ends a request early.
///
/// Attached to errors as data so the retry layer can decide whether to
/// degrade instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackStrategy {
    /// Safe placeholder description with `sensitive_content = true`.
    Blocked,
    /// Generic "analysis unavailable" description.
    Generic,
}

/// Coarse error classification used for stats and boundary mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Moderation,
    ContentFiltered,
    Network,
    Timeout,
    BreakerOpen,
    Configuration,
}

impl ErrorKind {
    /// All kinds, in a stable order.
    pub const ALL: [ErrorKind; 7] = [
        ErrorKind::Validation,
        ErrorKind::Moderation,
        ErrorKind::ContentFiltered,
        ErrorKind::Network,
        ErrorKind::Timeout,
        ErrorKind::BreakerOpen,
        ErrorKind::Configuration,
    ];

    /// Label used in metrics and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Moderation => "moderation",
            ErrorKind::ContentFiltered => "content_filtered",
            ErrorKind::Network => "network",
            ErrorKind::Timeout => "timeout",
            ErrorKind::BreakerOpen => "breaker_open",
            ErrorKind::Configuration => "configuration",
        }
    }
}

/// Heimdall error types
#[derive(Debug, thiserror::Error)]
pub enum HeimdallError {
    // Input errors
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("image not found: {0}")]
    ImageNotFound(String),

    #[error("unsupported image: {0}")]
    UnsupportedImage(String),

    // Policy errors
    #[error("moderation blocked request: {reason}")]
    Moderation {
        reason: String,
        fallback: Option<FallbackStrategy>,
    },

    #[error("content filtered: {reason}")]
    ContentFiltered { reason: String },

    // Remote errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Wall-clock limit that elapsed (zero when the transport did not say).
    #[error("remote call timed out")]
    Timeout(Duration),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("deployment not found: {0}")]
    DeploymentNotFound(String),

    #[error("empty response from model")]
    EmptyResponse,

    #[error("circuit breaker open, retry in {retry_in:?}")]
    CircuitOpen { retry_in: Duration },

    // Model output errors
    #[error("unparseable model output: {0}")]
    InvalidResponse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Anything that reached the outer boundary without a classification.
    #[error("unexpected error: {0}")]
    Unclassified(String),
}

impl HeimdallError {
    /// Whether retrying the same call may succeed.
    ///
    /// Network failures, timeouts, rate limits and 5xx responses are
    /// transient. Everything else (bad input, policy decisions, broken
    /// model output, an open breaker) is permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            HeimdallError::Http(_)
            | HeimdallError::Timeout(_)
            | HeimdallError::RateLimited { .. }
            | HeimdallError::EmptyResponse
            | HeimdallError::Unclassified(_) => true,
            HeimdallError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Provider-supplied backoff hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            HeimdallError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            HeimdallError::InvalidInput(_)
            | HeimdallError::ImageNotFound(_)
            | HeimdallError::UnsupportedImage(_)
            | HeimdallError::InvalidResponse(_)
            | HeimdallError::Json(_) => ErrorKind::Validation,
            HeimdallError::Moderation { .. } => ErrorKind::Moderation,
            HeimdallError::ContentFiltered { .. } => ErrorKind::ContentFiltered,
            HeimdallError::Timeout(_) => ErrorKind::Timeout,
            HeimdallError::CircuitOpen { .. } => ErrorKind::BreakerOpen,
            HeimdallError::Configuration(_) => ErrorKind::Configuration,
            HeimdallError::Http(_)
            | HeimdallError::Api { .. }
            | HeimdallError::RateLimited { .. }
            | HeimdallError::AuthenticationFailed
            | HeimdallError::DeploymentNotFound(_)
            | HeimdallError::EmptyResponse
            | HeimdallError::Unclassified(_) => ErrorKind::Network,
        }
    }

    /// Fallback result the pipeline may substitute for this error.
    pub fn fallback(&self) -> Option<FallbackStrategy> {
        match self {
            HeimdallError::Moderation { fallback, .. } => *fallback,
            e if e.is_transient() => Some(FallbackStrategy::Generic),
            _ => None,
        }
    }

    /// HTTP-equivalent status for the route layer.
    pub fn status(&self) -> u16 {
        match self {
            HeimdallError::InvalidInput(_)
            | HeimdallError::UnsupportedImage(_)
            | HeimdallError::InvalidResponse(_)
            | HeimdallError::Json(_) => 400,
            HeimdallError::ImageNotFound(_) => 404,
            HeimdallError::Moderation { .. } | HeimdallError::ContentFiltered { .. } => 451,
            HeimdallError::RateLimited { .. } => 429,
            HeimdallError::Timeout(_) => 504,
            HeimdallError::CircuitOpen { .. } => 503,
            _ => 502,
        }
    }

    /// Wrap a foreign error that was never classified.
    ///
    /// Errors that are already `HeimdallError` pass through untouched so a
    /// value is never reclassified twice.
    pub fn unclassified<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        let boxed: Box<dyn std::error::Error + Send + Sync> = Box::new(err);
        match boxed.downcast::<HeimdallError>() {
            Ok(inner) => *inner,
            Err(other) => HeimdallError::Unclassified(other.to_string()),
        }
    }

    /// Structured, serialisable view for callers.
    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            kind: self.kind(),
            message: self.to_string(),
            retryable: self.is_transient(),
            status: self.status(),
            fallback: self.fallback(),
        }
    }
}

impl From<reqwest::Error> for HeimdallError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            HeimdallError::Timeout(Duration::ZERO)
        } else if err.is_decode() {
            HeimdallError::InvalidResponse(err.to_string())
        } else {
            HeimdallError::Http(err.to_string())
        }
    }
}

/// User-visible failure shape returned at the boundary.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
    pub retryable: bool,
    pub status: u16,
    /// Substitute result the caller may render instead of the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<FallbackStrategy>,
}

/// Result type alias for Heimdall operations
pub type Result<T> = std::result::Result<T, HeimdallError>;
