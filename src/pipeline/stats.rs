//! Per-pipeline request statistics.
//!
//! One [`PipelineStats`] is created per pipeline (or injected by the
//! caller to share across pipelines). Counters are plain atomics; every
//! update is mirrored to the `metrics` facade.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

use crate::error::ErrorKind;
use crate::telemetry;

const KIND_COUNT: usize = ErrorKind::ALL.len();

/// Request outcome counters.
#[derive(Debug, Default)]
pub struct PipelineStats {
    total: AtomicU64,
    successes: AtomicU64,
    failures: [AtomicU64; KIND_COUNT],
    degraded: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    latency_micros: AtomicU64,
}

/// Serialisable copy of the counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub total_requests: u64,
    pub successes: u64,
    /// Failures by error kind label; kinds with no failures are omitted.
    pub failures: BTreeMap<&'static str, u64>,
    /// Successful requests answered with a fallback result.
    pub degraded: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_hit_rate: f64,
    pub total_latency_ms: f64,
    pub average_latency_ms: f64,
}

impl StatsSnapshot {
    pub fn failure_count(&self, kind: ErrorKind) -> u64 {
        self.failures.get(kind.as_str()).copied().unwrap_or(0)
    }

    pub fn total_failures(&self) -> u64 {
        self.failures.values().sum()
    }
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn finish(&self, operation: &'static str, status: &'static str, elapsed: Duration) {
        self.total.fetch_add(1, Ordering::Relaxed);
        self.latency_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
        metrics::counter!(telemetry::REQUESTS_TOTAL,
            "operation" => operation,
            "status" => status,
        )
        .increment(1);
        metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS, "operation" => operation)
            .record(elapsed.as_secs_f64());
    }

    pub fn record_success(&self, operation: &'static str, elapsed: Duration) {
        self.successes.fetch_add(1, Ordering::Relaxed);
        self.finish(operation, "ok", elapsed);
    }

    pub fn record_failure(&self, operation: &'static str, kind: ErrorKind, elapsed: Duration) {
        self.failures[kind as usize].fetch_add(1, Ordering::Relaxed);
        self.finish(operation, kind.as_str(), elapsed);
    }

    pub fn record_degraded(&self) {
        self.degraded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let total = self.total.load(Ordering::Relaxed);
        let hits = self.cache_hits.load(Ordering::Relaxed);
        let misses = self.cache_misses.load(Ordering::Relaxed);
        let latency_ms = self.latency_micros.load(Ordering::Relaxed) as f64 / 1_000.0;
        let failures = ErrorKind::ALL
            .iter()
            .map(|kind| (kind.as_str(), self.failures[*kind as usize].load(Ordering::Relaxed)))
            .filter(|(_, count)| *count > 0)
            .collect();
        StatsSnapshot {
            total_requests: total,
            successes: self.successes.load(Ordering::Relaxed),
            failures,
            degraded: self.degraded.load(Ordering::Relaxed),
            cache_hits: hits,
            cache_misses: misses,
            cache_hit_rate: if hits + misses == 0 {
                0.0
            } else {
                hits as f64 / (hits + misses) as f64
            },
            total_latency_ms: latency_ms,
            average_latency_ms: if total == 0 {
                0.0
            } else {
                latency_ms / total as f64
            },
        }
    }
}
