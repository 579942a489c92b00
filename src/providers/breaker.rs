//! Circuit breaker for the remote vision call.
//!
//! Closed → Open after `failure_threshold` consecutive transient failures.
//! Open → HalfOpen once `cooldown` has elapsed since opening. In HalfOpen
//! exactly one trial call is admitted; success closes the circuit, failure
//! reopens it. Callers rejected while Open (or while a trial is in flight)
//! get [`HeimdallError::CircuitOpen`] without touching the remote service.
//!
//! State lives behind a `parking_lot::Mutex` that is never held across an
//! await point: a call takes a [`BreakerPermit`], runs, then settles it.

use std::future::Future;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{info, warn};

use crate::telemetry;
use crate::{HeimdallError, Result};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half_open",
        }
    }
}

/// Breaker thresholds.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive transient failures that open the circuit. Default: 5.
    pub failure_threshold: u32,
    /// Time spent open before a trial call is admitted. Default: 30s.
    pub cooldown: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
        }
    }
}

impl BreakerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failure_threshold(mut self, n: u32) -> Self {
        self.failure_threshold = n.max(1);
        self
    }

    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }
}

/// Point-in-time view of the breaker, for health reports.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub state: BreakerState,
    pub consecutive_failures: u32,
    /// Seconds since the last recorded failure.
    pub last_failure_secs_ago: Option<f64>,
}

struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
    last_failure: Option<Instant>,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

/// Shared circuit breaker guarding one remote dependency.
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                last_failure: None,
                opened_at: None,
                trial_in_flight: false,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Effective state: an Open breaker past its cooldown reads as HalfOpen.
    pub fn state(&self) -> BreakerState {
        let inner = self.inner.lock();
        self.effective_state(&inner)
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.inner.lock();
        BreakerSnapshot {
            state: self.effective_state(&inner),
            consecutive_failures: inner.consecutive_failures,
            last_failure_secs_ago: inner.last_failure.map(|t| t.elapsed().as_secs_f64()),
        }
    }

    fn effective_state(&self, inner: &Inner) -> BreakerState {
        match (inner.state, inner.opened_at) {
            (BreakerState::Open, Some(at)) if at.elapsed() >= self.config.cooldown => {
                BreakerState::HalfOpen
            }
            (state, _) => state,
        }
    }

    /// Ask for permission to make one call.
    ///
    /// The returned permit must be settled with [`BreakerPermit::success`] or
    /// [`BreakerPermit::failure`]. A permit dropped unsettled (e.g. the call
    /// was cancelled) releases its trial slot without changing state.
    pub fn acquire(&self) -> Result<BreakerPermit<'_>> {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::Closed => Ok(BreakerPermit::new(self, false)),
            BreakerState::Open => {
                let opened_at = inner.opened_at.unwrap_or_else(Instant::now);
                let elapsed = opened_at.elapsed();
                if elapsed >= self.config.cooldown {
                    self.transition(&mut inner, BreakerState::HalfOpen);
                    inner.trial_in_flight = true;
                    Ok(BreakerPermit::new(self, true))
                } else {
                    Err(HeimdallError::CircuitOpen {
                        retry_in: self.config.cooldown - elapsed,
                    })
                }
            }
            BreakerState::HalfOpen if !inner.trial_in_flight => {
                inner.trial_in_flight = true;
                Ok(BreakerPermit::new(self, true))
            }
            BreakerState::HalfOpen => Err(HeimdallError::CircuitOpen {
                retry_in: Duration::ZERO,
            }),
        }
    }

    /// Run `f` under the breaker.
    ///
    /// Transient errors count as failures. Any other outcome means the
    /// remote service answered, so it counts as a success.
    pub async fn call<F, Fut, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let permit = self.acquire()?;
        let result = f().await;
        match &result {
            Err(e) if e.is_transient() => permit.failure(),
            _ => permit.success(),
        }
        result
    }

    fn on_success(&self, trial: bool) {
        let mut inner = self.inner.lock();
        if trial {
            inner.trial_in_flight = false;
        } else if inner.state != BreakerState::Closed {
            // Admitted before the circuit opened; only the trial may close it.
            return;
        }
        inner.consecutive_failures = 0;
        if inner.state != BreakerState::Closed {
            self.transition(&mut inner, BreakerState::Closed);
            inner.opened_at = None;
        }
    }

    fn on_failure(&self, trial: bool) {
        let mut inner = self.inner.lock();
        if trial {
            inner.trial_in_flight = false;
        }
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        inner.last_failure = Some(Instant::now());
        let should_open = match inner.state {
            BreakerState::HalfOpen => trial,
            BreakerState::Closed => inner.consecutive_failures >= self.config.failure_threshold,
            BreakerState::Open => false,
        };
        if should_open {
            self.transition(&mut inner, BreakerState::Open);
            inner.opened_at = Some(Instant::now());
        }
    }

    fn on_abandoned(&self, trial: bool) {
        if trial {
            self.inner.lock().trial_in_flight = false;
        }
    }

    fn transition(&self, inner: &mut Inner, to: BreakerState) {
        let from = inner.state;
        inner.state = to;
        metrics::counter!(telemetry::BREAKER_TRANSITIONS_TOTAL, "to" => to.as_str()).increment(1);
        match to {
            BreakerState::Open => warn!(
                breaker = %self.name,
                from = from.as_str(),
                failures = inner.consecutive_failures,
                cooldown_ms = self.config.cooldown.as_millis() as u64,
                "circuit opened"
            ),
            _ => info!(
                breaker = %self.name,
                from = from.as_str(),
                to = to.as_str(),
                "circuit state changed"
            ),
        }
    }
}

/// Permission for one call through a [`CircuitBreaker`].
#[must_use = "settle the permit with success() or failure()"]
pub struct BreakerPermit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    settled: bool,
}

impl<'a> BreakerPermit<'a> {
    fn new(breaker: &'a CircuitBreaker, trial: bool) -> Self {
        Self {
            breaker,
            trial,
            settled: false,
        }
    }

    /// Whether this permit is the half-open trial call.
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    pub fn success(mut self) {
        self.settled = true;
        self.breaker.on_success(self.trial);
    }

    pub fn failure(mut self) {
        self.settled = true;
        self.breaker.on_failure(self.trial);
    }
}

impl Drop for BreakerPermit<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.on_abandoned(self.trial);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, cooldown: Duration) -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            BreakerConfig::new()
                .failure_threshold(threshold)
                .cooldown(cooldown),
        )
    }

    fn fail(b: &CircuitBreaker) {
        b.acquire().unwrap().failure();
    }

    #[test]
    fn opens_after_threshold() {
        let b = breaker(3, Duration::from_secs(60));
        fail(&b);
        fail(&b);
        assert_eq!(b.state(), BreakerState::Closed);
        fail(&b);
        assert_eq!(b.state(), BreakerState::Open);
        assert!(matches!(b.acquire(), Err(HeimdallError::CircuitOpen { .. })));
    }

    #[test]
    fn success_resets_failure_count() {
        let b = breaker(2, Duration::from_secs(60));
        fail(&b);
        b.acquire().unwrap().success();
        fail(&b);
        assert_eq!(b.state(), BreakerState::Closed);
        assert_eq!(b.snapshot().consecutive_failures, 1);
    }

    #[test]
    fn half_open_admits_single_trial() {
        let b = breaker(1, Duration::ZERO);
        fail(&b);
        let trial = b.acquire().unwrap();
        assert!(trial.is_trial());
        assert!(matches!(b.acquire(), Err(HeimdallError::CircuitOpen { .. })));
        trial.success();
        assert_eq!(b.state(), BreakerState::Closed);
        b.acquire().unwrap().success();
    }

    #[test]
    fn failed_trial_reopens() {
        let b = breaker(1, Duration::from_millis(20));
        fail(&b);
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(b.state(), BreakerState::HalfOpen);
        b.acquire().unwrap().failure();
        assert_eq!(b.state(), BreakerState::Open);
    }

    #[test]
    fn dropped_trial_releases_slot() {
        let b = breaker(1, Duration::ZERO);
        fail(&b);
        drop(b.acquire().unwrap());
        let again = b.acquire().unwrap();
        assert!(again.is_trial());
        again.success();
    }

    #[test]
    fn late_success_does_not_close_open_circuit() {
        let b = breaker(1, Duration::from_secs(60));
        let slow = b.acquire().unwrap();
        fail(&b);
        assert_eq!(b.state(), BreakerState::Open);

        slow.success();
        assert_eq!(b.state(), BreakerState::Open);
        assert_eq!(b.snapshot().consecutive_failures, 1);
    }

    #[test]
    fn late_outcomes_leave_trial_in_charge() {
        let b = breaker(1, Duration::ZERO);
        let slow_ok = b.acquire().unwrap();
        let slow_err = b.acquire().unwrap();
        fail(&b);

        let trial = b.acquire().unwrap();
        assert!(trial.is_trial());
        slow_ok.success();
        slow_err.failure();
        assert!(matches!(b.acquire(), Err(HeimdallError::CircuitOpen { .. })));

        trial.success();
        assert_eq!(b.state(), BreakerState::Closed);
    }

    #[tokio::test]
    async fn permanent_errors_do_not_trip() {
        let b = breaker(1, Duration::from_secs(60));
        let result: Result<()> = b
            .call(|| async { Err(HeimdallError::AuthenticationFailed) })
            .await;
        assert!(result.is_err());
        assert_eq!(b.state(), BreakerState::Closed);

        let result: Result<()> = b
            .call(|| async { Err(HeimdallError::Http("reset".into())) })
            .await;
        assert!(result.is_err());
        assert_eq!(b.state(), BreakerState::Open);
    }
}
