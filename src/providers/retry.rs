//! Retry configuration, delay calculation and the degradation path.
//!
//! [`with_retry`] retries transient failures with exponential backoff.
//! [`with_degradation`] layers the fallback decision on top: when retries
//! are exhausted and the final error carries a [`FallbackStrategy`], the
//! caller gets an [`Attempt::Degraded`] value instead of an error.
//!
//! The retry loop knows nothing about the circuit breaker. Callers wrap
//! each attempt in the breaker; an open breaker surfaces as a permanent
//! error, so no further attempt is spent.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::error::FallbackStrategy;
use crate::telemetry;
use crate::{HeimdallError, Result};

/// Fraction of the backoff delay added as random jitter (at most).
const JITTER_FRACTION: f64 = 0.25;

/// Backoff and degradation settings for calls to the vision endpoint.
///
/// ```rust
/// # use heimdall::RetryConfig;
/// # use std::time::Duration;
/// let config = RetryConfig::new()
///     .max_attempts(5)
///     .initial_delay(Duration::from_millis(200))
///     .allow_degradation(false);
/// ```
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, the first call included. Default: 3.
    pub max_attempts: u32,
    /// Base delay before the first retry. Default: 1s.
    pub initial_delay: Duration,
    /// Maximum delay between retries (caps exponential growth). Default: 10s.
    pub max_delay: Duration,
    /// Add up to 25% random jitter to each backoff. Default: true.
    pub jitter: bool,
    /// Whether exhausted transient failures may degrade to a fallback
    /// result. Default: true.
    pub allow_degradation: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            jitter: true,
            allow_degradation: true,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// A single attempt, no backoff.
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n.max(1);
        self
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn jitter(mut self, enabled: bool) -> Self {
        self.jitter = enabled;
        self
    }

    /// Allow or forbid degrading to a fallback result.
    pub fn allow_degradation(mut self, allowed: bool) -> Self {
        self.allow_degradation = allowed;
        self
    }

    /// Backoff before retry number `attempt + 1`, without jitter:
    /// `initial_delay * 2^attempt`, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        delay.min(self.max_delay)
    }

    /// Calculate the effective delay, including jitter and `retry_after` hints.
    ///
    /// A `retry_after` duration (from a `RateLimited` error) takes precedence.
    /// Jitter adds up to 25% of the uncapped backoff before the cap is applied,
    /// which keeps successive delays non-decreasing.
    pub fn effective_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        if let Some(hint) = retry_after {
            return hint;
        }
        let base = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        let jittered = if self.jitter {
            let factor = rand::thread_rng().gen_range(0.0..=JITTER_FRACTION);
            base.saturating_add(base.mul_f64(factor))
        } else {
            base
        };
        jittered.min(self.max_delay)
    }
}

// ============================================================================
// Retry loop
// ============================================================================

/// Run `f` until it succeeds, fails permanently, or `config.max_attempts`
/// is spent.
///
/// Only errors for which [`HeimdallError::is_transient()`] holds are
/// retried; a `RateLimited` hint replaces the computed backoff. The sleep
/// between attempts holds no lock.
pub async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    provider_name: &str,
    operation: &str,
    f: F,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut last_err = None;
    for attempt in 0..max_attempts {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_transient() => {
                if attempt + 1 < max_attempts {
                    metrics::counter!(telemetry::RETRIES_TOTAL,
                        "provider" => provider_name.to_owned(),
                        "operation" => operation.to_owned(),
                    )
                    .increment(1);
                    let delay = config.effective_delay(attempt, e.retry_after());
                    warn!(
                        provider = provider_name,
                        operation,
                        attempt = attempt + 1,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying after transient error"
                    );
                    tokio::time::sleep(delay).await;
                }
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        HeimdallError::Unclassified(format!("{operation}: retry loop ran no attempts"))
    }))
}

// ============================================================================
// Degradation
// ============================================================================

/// Outcome of a retried call when degradation is allowed.
#[derive(Debug)]
pub enum Attempt<T> {
    /// The call succeeded.
    Completed(T),
    /// Retries ran out; the caller should substitute the fallback.
    Degraded {
        strategy: FallbackStrategy,
        cause: HeimdallError,
    },
}

impl<T> Attempt<T> {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Attempt::Degraded { .. })
    }
}

/// [`with_retry`] plus the fallback decision.
///
/// Exhausted transient failures become [`Attempt::Degraded`] when
/// `config.allow_degradation` is set and the error names a fallback
/// strategy. Everything else propagates unchanged.
pub async fn with_degradation<F, Fut, T>(
    config: &RetryConfig,
    provider_name: &str,
    operation: &str,
    f: F,
) -> Result<Attempt<T>>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match with_retry(config, provider_name, operation, f).await {
        Ok(value) => Ok(Attempt::Completed(value)),
        Err(e) if config.allow_degradation && e.is_transient() => match e.fallback() {
            Some(strategy) => {
                warn!(
                    provider = provider_name,
                    operation,
                    ?strategy,
                    error = %e,
                    "retries exhausted, degrading to fallback result"
                );
                metrics::counter!(telemetry::FALLBACKS_TOTAL,
                    "strategy" => format!("{strategy:?}").to_lowercase(),
                )
                .increment(1);
                Ok(Attempt::Degraded { strategy, cause: e })
            }
            None => Err(e),
        },
        Err(e) => Err(e),
    }
}
