// Copyright 2025 Loadscope Contributors
// SPDX-License-Identifier: Apache-2.0

//! Descriptive statistics over a sequence of samples.
//!
//! # Percentiles
//!
//! Percentiles use the nearest-rank method: elapsed times are sorted
//! ascending and percentile `p` of `n` values is the element at index
//! `ceil(p / 100 * n) - 1`, clamped to `[0, n - 1]`. No interpolation is
//! performed. Linear interpolation yields different values on the same data,
//! so reports produced with one method are not comparable with the other.
//!
//! # Rates
//!
//! Rates are percentages rounded to two decimals. `error_rate` is derived as
//! `100 - success_rate`, which keeps the pair summing to exactly 100 for any
//! non-empty sequence.

use crate::sample::{duration_ms, Sample};
use serde::{Deserialize, Serialize};

/// Summary statistics for one operation within one phase.
///
/// Always recomputed in full from its source samples.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SummaryStat {
    /// Arithmetic mean of all elapsed times, failed samples included.
    pub average_ms: f64,
    /// Fastest sample.
    pub min_ms: f64,
    /// Slowest sample.
    pub max_ms: f64,
    /// 50th percentile (nearest rank).
    pub p50_ms: f64,
    /// 95th percentile (nearest rank).
    pub p95_ms: f64,
    /// 99th percentile (nearest rank).
    pub p99_ms: f64,
    /// Percentage of samples that succeeded.
    pub success_rate: f64,
    /// Percentage of samples that failed.
    pub error_rate: f64,
    /// Number of successful samples.
    pub successful: usize,
    /// Number of failed samples.
    pub failed: usize,
    /// Number of attempted operations, failures included.
    pub sample_count: usize,
}

impl SummaryStat {
    /// True when no samples were recorded.
    pub fn is_empty(&self) -> bool {
        self.sample_count == 0
    }
}

/// Reduce a sequence of samples to summary statistics.
///
/// An empty sequence yields the zero-filled [`SummaryStat::default`].
pub fn summarize(samples: &[Sample]) -> SummaryStat {
    if samples.is_empty() {
        return SummaryStat::default();
    }

    let mut times: Vec<f64> = samples.iter().map(Sample::elapsed_ms).collect();
    times.sort_by(|a, b| a.total_cmp(b));

    let n = times.len();
    let successful = samples.iter().filter(|s| s.succeeded()).count();
    let success_rate = percentage(successful, n);

    SummaryStat {
        average_ms: times.iter().sum::<f64>() / n as f64,
        min_ms: times[0],
        max_ms: times[n - 1],
        p50_ms: percentile(&times, 50.0),
        p95_ms: percentile(&times, 95.0),
        p99_ms: percentile(&times, 99.0),
        success_rate,
        error_rate: round2(100.0 - success_rate),
        successful,
        failed: n - successful,
        sample_count: n,
    }
}

/// Nearest-rank index for percentile `p` over `n` sorted values.
///
/// Returns `None` when `n == 0`.
pub fn percentile_index(p: f64, n: usize) -> Option<usize> {
    if n == 0 {
        return None;
    }
    let rank = (p * n as f64 / 100.0).ceil() as i64 - 1;
    Some(rank.clamp(0, n as i64 - 1) as usize)
}

/// Nearest-rank percentile of an ascending slice. Zero for an empty slice.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    percentile_index(p, sorted.len())
        .map(|idx| sorted[idx])
        .unwrap_or(0.0)
}

/// Share of successful samples that the target reported as cached, in percent.
pub fn cache_hit_rate(samples: &[Sample]) -> f64 {
    let successes: Vec<&Sample> = samples.iter().filter(|s| s.succeeded()).collect();
    let hits = successes.iter().filter(|s| s.cached).count();
    percentage(hits, successes.len())
}

/// `part / whole` as a percentage rounded to two decimals; zero when `whole == 0`.
pub fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round2(part as f64 * 100.0 / whole as f64)
}

/// Round half away from zero to two decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Mean elapsed time of a sample sequence in milliseconds.
pub fn mean_ms(samples: &[Sample]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().map(|s| duration_ms(s.elapsed)).sum::<f64>() / samples.len() as f64
}
