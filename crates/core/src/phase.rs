// Copyright 2025 Loadscope Contributors
// SPDX-License-Identifier: Apache-2.0

//! Phase results.
//!
//! Every load-shape invocation yields exactly one [`PhaseResult`]: the
//! per-operation summaries plus whatever extra the shape computes (cache
//! speed-ups, burst throughput, rate-limit overhead).

use crate::sample::{duration_ms, Sample};
use crate::stats::{self, SummaryStat};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// The phases of an audit run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Repeated calls to the health operation.
    Baseline,
    /// Serial-paced calls to every catalogued endpoint.
    PerOperation,
    /// Serial-paced calls to database-heavy endpoints.
    DataHeavy,
    /// Cold/warm probes of cache-sensitive endpoints.
    CacheProbe,
    /// Memory snapshots around a load burst.
    Memory,
    /// Concurrent bursts at increasing levels.
    ConcurrencyScaling,
    /// Fixed-iteration calls through the rate-limited path.
    RateLimitOverhead,
}

impl Phase {
    /// Stable snake-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Baseline => "baseline",
            Phase::PerOperation => "per_operation",
            Phase::DataHeavy => "data_heavy",
            Phase::CacheProbe => "cache_probe",
            Phase::Memory => "memory",
            Phase::ConcurrencyScaling => "concurrency_scaling",
            Phase::RateLimitOverhead => "rate_limit_overhead",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of one named operation within a phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    /// Operation name from the catalogue.
    pub name: String,
    /// Statistics over every attempt at the operation.
    pub stats: SummaryStat,
    /// Percentage of successful responses flagged as cached, where tracked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_hit_rate: Option<f64>,
}

impl OperationResult {
    /// Summarize a sample sequence for `name`.
    pub fn from_samples(name: impl Into<String>, samples: &[Sample]) -> Self {
        Self {
            name: name.into(),
            stats: stats::summarize(samples),
            cache_hit_rate: None,
        }
    }

    /// Summarize a sample sequence and also record its cache-hit rate.
    pub fn with_cache_tracking(name: impl Into<String>, samples: &[Sample]) -> Self {
        Self {
            cache_hit_rate: Some(stats::cache_hit_rate(samples)),
            ..Self::from_samples(name, samples)
        }
    }
}

/// Cold-then-warm comparison of one cache-sensitive operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheProbeResult {
    /// Operation name.
    pub operation: String,
    /// Elapsed time of the first (cold) call.
    pub cold_ms: f64,
    /// Elapsed time of the immediately following (warm) call.
    pub warm_ms: f64,
    /// Whether the warm response declared itself cached.
    pub warm_cached: bool,
    /// Relative improvement in percent; absent when either call failed.
    pub speedup_percent: Option<f64>,
}

impl CacheProbeResult {
    /// Compare a cold and a warm sample of the same operation.
    pub fn from_pair(operation: impl Into<String>, cold: &Sample, warm: &Sample) -> Self {
        let speedup_percent = (cold.succeeded() && warm.succeeded())
            .then(|| cache_speedup(cold.elapsed, warm.elapsed));
        Self {
            operation: operation.into(),
            cold_ms: cold.elapsed_ms(),
            warm_ms: warm.elapsed_ms(),
            warm_cached: warm.cached,
            speedup_percent,
        }
    }
}

/// Cache speed-up ratio `(cold - warm) / cold` in percent.
///
/// A zero cold time is defined as 0% improvement.
pub fn cache_speedup(cold: Duration, warm: Duration) -> f64 {
    let cold_ms = duration_ms(cold);
    if cold_ms <= 0.0 {
        return 0.0;
    }
    stats::round2((cold_ms - duration_ms(warm)) / cold_ms * 100.0)
}

/// Outcome of one concurrent burst.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurstStats {
    /// Number of operations launched together.
    pub concurrency: usize,
    /// Operations that succeeded.
    pub successful_requests: usize,
    /// Operations that failed or timed out.
    pub failed_requests: usize,
    /// `successful / concurrency` in percent.
    pub success_rate: f64,
    /// Wall time from launch until the last operation completed.
    pub wall_time_ms: f64,
    /// `concurrency / wall time` in seconds.
    pub requests_per_second: f64,
}

impl BurstStats {
    /// Derive burst statistics from every sample launched in the burst.
    pub fn from_samples(samples: &[Sample], wall_time: Duration) -> Self {
        let concurrency = samples.len();
        let successful_requests = samples.iter().filter(|s| s.succeeded()).count();
        let secs = wall_time.as_secs_f64();
        Self {
            concurrency,
            successful_requests,
            failed_requests: concurrency - successful_requests,
            success_rate: stats::percentage(successful_requests, concurrency),
            wall_time_ms: duration_ms(wall_time),
            requests_per_second: if secs > 0.0 {
                stats::round2(concurrency as f64 / secs)
            } else {
                0.0
            },
        }
    }
}

/// Cost of the rate-limiting layer relative to the baseline path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitStats {
    /// Average of the baseline phase.
    pub baseline_average_ms: f64,
    /// Average of the rate-limited operation.
    pub limited_average_ms: f64,
    /// `limited - baseline`; may be negative on a noisy run.
    pub overhead_ms: f64,
    /// Responses answered with 429 Too Many Requests.
    pub throttled_responses: usize,
}

impl RateLimitStats {
    /// Compare rate-limited samples against the baseline average.
    pub fn compute(baseline: &SummaryStat, limited: &[Sample]) -> Self {
        let limited_average_ms = stats::mean_ms(limited);
        Self {
            baseline_average_ms: baseline.average_ms,
            limited_average_ms,
            overhead_ms: stats::round2(limited_average_ms - baseline.average_ms),
            throttled_responses: limited.iter().filter(|s| s.status == Some(429)).count(),
        }
    }
}

/// Phase-specific data beyond per-operation summaries.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum PhaseExtras {
    /// Nothing beyond the summaries.
    #[default]
    None,
    /// Cold/warm comparisons.
    CacheProbes(Vec<CacheProbeResult>),
    /// Burst throughput.
    Burst(BurstStats),
    /// Rate-limit overhead.
    RateLimit(RateLimitStats),
}

/// Result of one load-shape invocation. Written once by the phase that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseResult {
    /// Which phase produced this result.
    pub phase: Phase,
    /// Unique key within the report, e.g. `concurrency/50`.
    pub key: String,
    /// Per-operation summaries in execution order.
    pub operations: Vec<OperationResult>,
    /// Phase-specific extra data.
    #[serde(default)]
    pub extras: PhaseExtras,
}

impl PhaseResult {
    /// Empty result keyed by the phase name.
    pub fn new(phase: Phase) -> Self {
        Self::keyed(phase, phase.as_str())
    }

    /// Empty result with an explicit key.
    pub fn keyed(phase: Phase, key: impl Into<String>) -> Self {
        Self {
            phase,
            key: key.into(),
            operations: Vec::new(),
            extras: PhaseExtras::None,
        }
    }

    /// Append an operation summary.
    pub fn with_operation(mut self, operation: OperationResult) -> Self {
        self.operations.push(operation);
        self
    }

    /// Attach phase-specific extras.
    pub fn with_extras(mut self, extras: PhaseExtras) -> Self {
        self.extras = extras;
        self
    }

    /// Look up an operation summary by name.
    pub fn operation(&self, name: &str) -> Option<&OperationResult> {
        self.operations.iter().find(|op| op.name == name)
    }

    /// Total attempted operations across the phase.
    pub fn total_samples(&self) -> usize {
        self.operations.iter().map(|op| op.stats.sample_count).sum()
    }

    /// Burst statistics, if this is a burst phase.
    pub fn burst(&self) -> Option<&BurstStats> {
        match &self.extras {
            PhaseExtras::Burst(burst) => Some(burst),
            _ => None,
        }
    }

    /// Cache probes, if this is a cache-probe phase.
    pub fn cache_probes(&self) -> &[CacheProbeResult] {
        match &self.extras {
            PhaseExtras::CacheProbes(probes) => probes,
            _ => &[],
        }
    }

    /// Rate-limit statistics, if this is the rate-limit phase.
    pub fn rate_limit(&self) -> Option<&RateLimitStats> {
        match &self.extras {
            PhaseExtras::RateLimit(stats) => Some(stats),
            _ => None,
        }
    }
}
