//! Breaker- and timeout-guarded vision provider decorator.
//!
//! Wraps any `VisionProvider` so that every `complete` call:
//! - is rejected up front while the shared circuit breaker is open
//! - is bounded by the request's wall-clock timeout
//! - reports its outcome back to the breaker
//!
//! Retry lives one layer up (see [`with_degradation`](super::retry::with_degradation)),
//! so each retry attempt passes through the breaker on its own.

use std::sync::Arc;

use async_trait::async_trait;

use super::breaker::CircuitBreaker;
use super::traits::{VisionProvider, VisionRequest};
use crate::{HeimdallError, Result};

/// A `VisionProvider` that enforces a circuit breaker and per-call timeout.
pub struct GuardedVisionProvider {
    inner: Arc<dyn VisionProvider>,
    breaker: Arc<CircuitBreaker>,
}

impl GuardedVisionProvider {
    pub fn new(inner: Arc<dyn VisionProvider>, breaker: Arc<CircuitBreaker>) -> Self {
        Self { inner, breaker }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }
}

#[async_trait]
impl VisionProvider for GuardedVisionProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }

    fn api_version(&self) -> &str {
        self.inner.api_version()
    }

    async fn complete(&self, request: &VisionRequest<'_>) -> Result<String> {
        let timeout = request.params.timeout;
        self.breaker
            .call(|| async {
                tokio::time::timeout(timeout, self.inner.complete(request))
                    .await
                    .map_err(|_| HeimdallError::Timeout(timeout))?
            })
            .await
    }

    // Probes bypass the breaker: health must see the endpoint even while open.
    async fn probe(&self) -> Result<()> {
        self.inner.probe().await
    }
}
