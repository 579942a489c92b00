//! Health snapshot types.

use serde::Serialize;

use super::stats::StatsSnapshot;
use crate::providers::{BreakerSnapshot, BreakerState};

/// Result of [`VisionPipeline::health_check`](super::VisionPipeline::health_check).
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// Endpoint reachable and breaker not open.
    pub healthy: bool,
    pub details: HealthDetails,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthDetails {
    pub version: String,
    pub endpoint: EndpointHealth,
    pub cache_entries: u64,
    pub breaker: BreakerSnapshot,
    pub stats: StatsSnapshot,
}

/// Outcome of the endpoint probe.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointHealth {
    pub provider: String,
    pub model: String,
    pub reachable: bool,
    pub latency_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthReport {
    pub(crate) fn new(details: HealthDetails) -> Self {
        let healthy = details.endpoint.reachable && details.breaker.state != BreakerState::Open;
        Self { healthy, details }
    }
}
