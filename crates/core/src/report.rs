// Copyright 2025 Loadscope Contributors
// SPDX-License-Identifier: Apache-2.0

//! The benchmark report aggregate and its builder.
//!
//! A [`BenchmarkReport`] lives for one invocation only. Phases hand their
//! results to a [`ReportBuilder`], which accepts each result once and refuses
//! to build until every mandatory phase has reported.

use crate::error::ReportError;
use crate::memory::{Availability, MemoryReport, SystemMetrics};
use crate::phase::{
    BurstStats, CacheProbeResult, OperationResult, Phase, PhaseResult, RateLimitStats,
};
use crate::recommend::{Recommendation, RecommendationEngine, RecommendationKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Everything measured during one audit run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkReport {
    /// Unique run identifier.
    pub run_id: Uuid,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the last phase finished.
    pub finished_at: DateTime<Utc>,
    /// Base URL of the audited service.
    pub target: String,
    /// Name of the benchmark profile used.
    pub profile: String,
    /// Baseline phase.
    pub baseline: PhaseResult,
    /// Per-operation phase.
    pub per_operation: PhaseResult,
    /// Database-heavy phase.
    pub data_heavy: PhaseResult,
    /// Cache-probe phase.
    pub cache_probe: PhaseResult,
    /// Memory phase, or why it could not run.
    pub memory: Availability<MemoryReport>,
    /// One result per concurrency level, in the order they ran.
    pub concurrency: Vec<PhaseResult>,
    /// Rate-limit overhead phase.
    pub rate_limit: PhaseResult,
    /// Target self-reported metrics at the end of the run.
    pub system: Availability<SystemMetrics>,
    /// Findings and static advice, in rule-evaluation order.
    pub recommendations: Vec<Recommendation>,
}

impl BenchmarkReport {
    /// Operations whose latency and error rate feed the per-operation rules.
    pub fn measured_operations(&self) -> impl Iterator<Item = &OperationResult> {
        self.per_operation
            .operations
            .iter()
            .chain(self.data_heavy.operations.iter())
    }

    /// Cold/warm probe results.
    pub fn cache_probes(&self) -> &[CacheProbeResult] {
        self.cache_probe.cache_probes()
    }

    /// Burst statistics of the highest concurrency level tested.
    pub fn highest_concurrency(&self) -> Option<&BurstStats> {
        self.concurrency
            .iter()
            .filter_map(PhaseResult::burst)
            .max_by_key(|burst| burst.concurrency)
    }

    /// Rate-limit overhead, if measured.
    pub fn rate_limit_stats(&self) -> Option<&RateLimitStats> {
        self.rate_limit.rate_limit()
    }

    /// Attach recommendations produced by `engine`.
    pub fn with_recommendations(mut self, engine: &RecommendationEngine) -> Self {
        self.recommendations = engine.evaluate(&self);
        self
    }

    /// Data-driven findings only.
    pub fn findings(&self) -> impl Iterator<Item = &Recommendation> {
        self.recommendations
            .iter()
            .filter(|r| r.kind == RecommendationKind::Finding)
    }

    /// Static best-practice advice only.
    pub fn best_practices(&self) -> impl Iterator<Item = &Recommendation> {
        self.recommendations
            .iter()
            .filter(|r| r.kind == RecommendationKind::BestPractice)
    }

    /// Total samples attempted across every phase.
    pub fn total_samples(&self) -> usize {
        let memory = self
            .memory
            .as_available()
            .map(|m| m.load.concurrency)
            .unwrap_or(0);
        [
            &self.baseline,
            &self.per_operation,
            &self.data_heavy,
            &self.cache_probe,
            &self.rate_limit,
        ]
        .iter()
        .map(|phase| phase.total_samples())
        .chain(self.concurrency.iter().map(PhaseResult::total_samples))
        .sum::<usize>()
            + memory
    }
}

/// Collects phase results for one run.
#[derive(Debug)]
pub struct ReportBuilder {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    target: String,
    profile: String,
    baseline: Option<PhaseResult>,
    per_operation: Option<PhaseResult>,
    data_heavy: Option<PhaseResult>,
    cache_probe: Option<PhaseResult>,
    memory: Option<Availability<MemoryReport>>,
    concurrency: Vec<PhaseResult>,
    rate_limit: Option<PhaseResult>,
    system: Option<Availability<SystemMetrics>>,
}

fn set_once<T>(slot: &mut Option<T>, value: T, key: &str) -> Result<(), ReportError> {
    if slot.is_some() {
        return Err(ReportError::AlreadyRecorded(key.to_string()));
    }
    *slot = Some(value);
    Ok(())
}

impl ReportBuilder {
    /// Start a report for `target` using the named profile.
    pub fn new(target: impl Into<String>, profile: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            target: target.into(),
            profile: profile.into(),
            baseline: None,
            per_operation: None,
            data_heavy: None,
            cache_probe: None,
            memory: None,
            concurrency: Vec::new(),
            rate_limit: None,
            system: None,
        }
    }

    /// Identifier the finished report will carry.
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Baseline result, once recorded.
    pub fn baseline(&self) -> Option<&PhaseResult> {
        self.baseline.as_ref()
    }

    /// Record a phase result. Each key is accepted once.
    pub fn record_phase(&mut self, result: PhaseResult) -> Result<(), ReportError> {
        let key = result.key.clone();
        match result.phase {
            Phase::Baseline => set_once(&mut self.baseline, result, &key),
            Phase::PerOperation => set_once(&mut self.per_operation, result, &key),
            Phase::DataHeavy => set_once(&mut self.data_heavy, result, &key),
            Phase::CacheProbe => set_once(&mut self.cache_probe, result, &key),
            Phase::RateLimitOverhead => set_once(&mut self.rate_limit, result, &key),
            Phase::ConcurrencyScaling => {
                if self.concurrency.iter().any(|r| r.key == key) {
                    return Err(ReportError::AlreadyRecorded(key));
                }
                self.concurrency.push(result);
                Ok(())
            }
            Phase::Memory => Err(ReportError::UnsupportedPhase(Phase::Memory)),
        }
    }

    /// Record the memory phase outcome.
    pub fn record_memory(
        &mut self,
        memory: Availability<MemoryReport>,
    ) -> Result<(), ReportError> {
        set_once(&mut self.memory, memory, Phase::Memory.as_str())
    }

    /// Record the end-of-run system metrics.
    pub fn record_system(
        &mut self,
        system: Availability<SystemMetrics>,
    ) -> Result<(), ReportError> {
        set_once(&mut self.system, system, "system")
    }

    /// Finish the report. Recommendations start empty.
    pub fn build(self) -> Result<BenchmarkReport, ReportError> {
        let missing = ReportError::MissingPhase;
        Ok(BenchmarkReport {
            run_id: self.run_id,
            started_at: self.started_at,
            finished_at: Utc::now(),
            target: self.target,
            profile: self.profile,
            baseline: self.baseline.ok_or(missing(Phase::Baseline))?,
            per_operation: self.per_operation.ok_or(missing(Phase::PerOperation))?,
            data_heavy: self.data_heavy.ok_or(missing(Phase::DataHeavy))?,
            cache_probe: self.cache_probe.ok_or(missing(Phase::CacheProbe))?,
            memory: self.memory.ok_or(missing(Phase::Memory))?,
            concurrency: self.concurrency,
            rate_limit: self.rate_limit.ok_or(missing(Phase::RateLimitOverhead))?,
            system: self
                .system
                .unwrap_or_else(|| Availability::unavailable("system metrics not captured")),
            recommendations: Vec::new(),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::phase::PhaseExtras;
    use crate::sample::{Outcome, Sample};
    use std::time::Duration;

    pub(crate) fn builder_with_all_phases() -> ReportBuilder {
        let mut builder = ReportBuilder::new("http://localhost:3000", "gentle");
        for phase in [
            Phase::Baseline,
            Phase::PerOperation,
            Phase::DataHeavy,
            Phase::CacheProbe,
            Phase::RateLimitOverhead,
        ] {
            builder.record_phase(PhaseResult::new(phase)).unwrap();
        }
        builder
            .record_memory(Availability::unavailable("not measured"))
            .unwrap();
        builder
    }

    fn burst(level: usize, failures: usize) -> PhaseResult {
        let samples: Vec<Sample> = (0..level)
            .map(|i| {
                if i < failures {
                    Sample::failed(Duration::from_millis(5), "timeout")
                } else {
                    Sample::from_outcome(Duration::from_millis(5), Outcome::status(200))
                }
            })
            .collect();
        PhaseResult::keyed(Phase::ConcurrencyScaling, format!("concurrency/{level}")).with_extras(
            PhaseExtras::Burst(BurstStats::from_samples(&samples, Duration::from_millis(50))),
        )
    }

    #[test]
    fn test_build_requires_every_phase() {
        let builder = ReportBuilder::new("http://localhost:3000", "gentle");
        assert_eq!(
            builder.build().unwrap_err(),
            ReportError::MissingPhase(Phase::Baseline)
        );

        let report = builder_with_all_phases().build().unwrap();
        assert!(report.recommendations.is_empty());
        assert!(!report.system.is_available());
    }

    #[test]
    fn test_phase_results_are_written_once() {
        let mut builder = builder_with_all_phases();
        assert_eq!(
            builder.record_phase(PhaseResult::new(Phase::Baseline)),
            Err(ReportError::AlreadyRecorded("baseline".to_string()))
        );

        builder.record_phase(burst(10, 0)).unwrap();
        assert!(builder.record_phase(burst(10, 0)).is_err());
        builder.record_phase(burst(25, 0)).unwrap();

        assert_eq!(
            builder.record_phase(PhaseResult::new(Phase::Memory)),
            Err(ReportError::UnsupportedPhase(Phase::Memory))
        );
        assert!(builder
            .record_memory(Availability::unavailable("again"))
            .is_err());
    }

    #[test]
    fn test_highest_concurrency_picks_largest_level() {
        let mut builder = builder_with_all_phases();
        builder.record_phase(burst(50, 0)).unwrap();
        builder.record_phase(burst(100, 10)).unwrap();
        builder.record_phase(burst(10, 0)).unwrap();
        let report = builder.build().unwrap();

        let highest = report.highest_concurrency().unwrap();
        assert_eq!(highest.concurrency, 100);
        assert_eq!(highest.success_rate, 90.0);
        assert_eq!(report.total_samples(), 0);
    }
}
