//! Phase sequencing.
//!
//! A run walks a fixed stage sequence. Each stage runs to completion before
//! the next starts; the only fatal outcome is a baseline whose first call
//! gets no response at all.
//!
//! ```text
//! Baseline -> PerOperation -> DataHeavy -> CacheProbe -> Memory
//!          -> ConcurrencyScaling -> RateLimitOverhead -> Report
//! ```

use crate::config::{AuditConfig, BenchmarkProfile, OperationCatalog};
use crate::error::{AuditError, Result};
use crate::profiler::MemoryProfiler;
use crate::runner::PhaseRunner;
use crate::target::{HttpTarget, Target};
use loadscope_core::{
    BenchmarkReport, OperationResult, Phase, PhaseResult, RecommendationEngine, ReportBuilder,
    SummaryStat,
};
use std::fmt;
use std::sync::Arc;
use tracing::{error, info};

/// Stages of a run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Reachability check and baseline latency.
    Baseline,
    /// Every catalogued endpoint, serially.
    PerOperation,
    /// Database-heavy endpoints, serially.
    DataHeavy,
    /// Cold/warm cache probes.
    CacheProbe,
    /// Memory snapshots around a burst.
    Memory,
    /// One burst per configured level.
    ConcurrencyScaling,
    /// Rate-limited path against the baseline.
    RateLimitOverhead,
    /// System metrics, recommendations and report assembly.
    Report,
}

impl Stage {
    /// Stage that follows this one, or `None` after [`Stage::Report`].
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Baseline => Some(Stage::PerOperation),
            Stage::PerOperation => Some(Stage::DataHeavy),
            Stage::DataHeavy => Some(Stage::CacheProbe),
            Stage::CacheProbe => Some(Stage::Memory),
            Stage::Memory => Some(Stage::ConcurrencyScaling),
            Stage::ConcurrencyScaling => Some(Stage::RateLimitOverhead),
            Stage::RateLimitOverhead => Some(Stage::Report),
            Stage::Report => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Baseline => "baseline",
            Stage::PerOperation => "per_operation",
            Stage::DataHeavy => "data_heavy",
            Stage::CacheProbe => "cache_probe",
            Stage::Memory => "memory",
            Stage::ConcurrencyScaling => "concurrency_scaling",
            Stage::RateLimitOverhead => "rate_limit_overhead",
            Stage::Report => "report",
        };
        f.write_str(name)
    }
}

/// Runs every phase against one target and assembles the report.
pub struct BenchmarkOrchestrator {
    target: Arc<dyn Target>,
    profile: BenchmarkProfile,
    profile_name: String,
    catalog: OperationCatalog,
    engine: RecommendationEngine,
}

impl BenchmarkOrchestrator {
    /// Orchestrator with the standard recommendation rules.
    pub fn new(
        target: Arc<dyn Target>,
        profile: BenchmarkProfile,
        catalog: OperationCatalog,
        profile_name: impl Into<String>,
    ) -> Self {
        Self {
            target,
            profile,
            profile_name: profile_name.into(),
            catalog,
            engine: RecommendationEngine::standard(),
        }
    }

    /// Validate `config` and build an orchestrator driving an [`HttpTarget`].
    pub fn from_config(config: &AuditConfig) -> Result<Self> {
        config.validate()?;
        let target = HttpTarget::new(&config.base_url, config.operations.health.path.clone())?;
        Ok(Self::new(
            Arc::new(target),
            config.resolved_profile(),
            config.operations.clone(),
            config.profile.as_str(),
        ))
    }

    /// Replace the recommendation engine.
    pub fn with_engine(mut self, engine: RecommendationEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Profile in effect.
    pub fn profile(&self) -> &BenchmarkProfile {
        &self.profile
    }

    /// Execute every stage in order and return the finished report.
    ///
    /// # Errors
    ///
    /// [`AuditError::Unreachable`] when the first baseline call gets no
    /// response. Individual failed calls in any later stage are recorded in
    /// the report instead.
    pub async fn run(&self) -> Result<BenchmarkReport> {
        let target = self.target.as_ref();
        let runner = PhaseRunner::new(target, &self.profile);
        let profiler = MemoryProfiler::new(target, &self.profile);
        let mut builder = ReportBuilder::new(target.describe(), self.profile_name.clone());

        info!(
            run_id = %builder.run_id(),
            url = %target.describe(),
            profile = %self.profile_name,
            "Starting audit"
        );

        let mut stage = Some(Stage::Baseline);
        while let Some(current) = stage {
            info!(stage = %current, "Entering stage");
            match current {
                Stage::Baseline => builder.record_phase(self.baseline(&runner).await?)?,
                Stage::PerOperation => builder.record_phase(
                    runner
                        .serial_paced(
                            Phase::PerOperation,
                            &self.catalog.endpoints,
                            self.profile.iterations_per_endpoint,
                            self.profile.request_timeout(),
                            false,
                        )
                        .await,
                )?,
                Stage::DataHeavy => builder.record_phase(
                    runner
                        .serial_paced(
                            Phase::DataHeavy,
                            &self.catalog.data_heavy,
                            self.profile.iterations_per_endpoint,
                            self.profile.request_timeout(),
                            true,
                        )
                        .await,
                )?,
                Stage::CacheProbe => {
                    builder.record_phase(runner.cache_probe(&self.catalog.cache_probes).await)?
                }
                Stage::Memory => {
                    builder.record_memory(profiler.profile(&self.catalog.burst).await)?
                }
                Stage::ConcurrencyScaling => {
                    for &level in &self.profile.concurrency_levels {
                        builder.record_phase(
                            runner.concurrent_burst(&self.catalog.burst, level).await,
                        )?;
                    }
                }
                Stage::RateLimitOverhead => {
                    let baseline = builder
                        .baseline()
                        .and_then(|b| b.operation(&self.catalog.health.name))
                        .map(|op| op.stats)
                        .unwrap_or_default();
                    builder.record_phase(
                        runner
                            .rate_limit_overhead(&self.catalog.rate_limited, &baseline)
                            .await,
                    )?;
                }
                Stage::Report => builder.record_system(profiler.system_metrics().await)?,
            }
            stage = current.next();
        }

        let report = builder.build()?.with_recommendations(&self.engine);
        info!(
            run_id = %report.run_id,
            samples = report.total_samples(),
            findings = report.findings().count(),
            "Audit complete"
        );
        Ok(report)
    }

    async fn baseline(&self, runner: &PhaseRunner<'_>) -> Result<PhaseResult> {
        let health = &self.catalog.health;
        let timeout = self.profile.baseline_timeout();
        let mut pacer = runner.pacer();

        let first = runner.sample(health, timeout).await;
        if !first.reached_target() {
            let cause = first
                .error
                .unwrap_or_else(|| "no response".to_string());
            error!(url = %self.target.describe(), cause = %cause, "Target unreachable");
            return Err(AuditError::Unreachable {
                target: self.target.describe(),
                cause,
            });
        }
        pacer.tick().await;

        let mut samples = vec![first];
        samples.extend(
            runner
                .serial_samples(
                    health,
                    self.profile.baseline_iterations.saturating_sub(1),
                    timeout,
                    &mut pacer,
                )
                .await,
        );

        let summary = OperationResult::from_samples(&health.name, &samples);
        log_baseline(&summary.stats);
        Ok(PhaseResult::new(Phase::Baseline).with_operation(summary))
    }
}

fn log_baseline(stats: &SummaryStat) {
    info!(
        average_ms = stats.average_ms,
        p95_ms = stats.p95_ms,
        p99_ms = stats.p99_ms,
        success_rate = stats.success_rate,
        "Baseline measured"
    );
}
