//! Memory profiling through the target's health signal.
//!
//! The profiler takes an initial snapshot, loads the target with one burst,
//! snapshots again, waits for the settle delay and takes a final snapshot.
//! Any snapshot that cannot be read makes the whole memory sub-report
//! unavailable; the run itself continues.

use crate::config::BenchmarkProfile;
use crate::runner::PhaseRunner;
use crate::target::{Operation, Target, TargetError};
use chrono::Utc;
use loadscope_core::phase::BurstStats;
use loadscope_core::{Availability, HealthError, MemoryReport, MemorySnapshot, SystemMetrics};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Why a health snapshot could not be taken.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The health interface failed.
    #[error("health read failed: {0}")]
    Health(#[from] TargetError),

    /// The health interface did not answer in time.
    #[error("health read timed out after {0:?}")]
    TimedOut(Duration),

    /// The health body lacked memory figures.
    #[error("health body unusable: {0}")]
    Parse(#[from] HealthError),
}

/// Reads memory snapshots and system metrics from a target.
pub struct MemoryProfiler<'a> {
    target: &'a dyn Target,
    profile: &'a BenchmarkProfile,
}

impl<'a> MemoryProfiler<'a> {
    /// Profiler for `target` using the burst size and settle delay of `profile`.
    pub fn new(target: &'a dyn Target, profile: &'a BenchmarkProfile) -> Self {
        Self { target, profile }
    }

    async fn read_health(&self) -> Result<Value, SnapshotError> {
        let limit = self.profile.baseline_timeout();
        tokio::time::timeout(limit, self.target.health())
            .await
            .map_err(|_| SnapshotError::TimedOut(limit))?
            .map_err(SnapshotError::from)
    }

    /// Read one memory snapshot.
    pub async fn snapshot(&self) -> Result<MemorySnapshot, SnapshotError> {
        let health = self.read_health().await?;
        Ok(MemorySnapshot::from_health(&health, Utc::now())?)
    }

    /// Read process-level metrics.
    pub async fn system_metrics(&self) -> Availability<SystemMetrics> {
        let result = match self.read_health().await {
            Ok(health) => SystemMetrics::from_health(&health).map_err(SnapshotError::from),
            Err(err) => Err(err),
        };
        if let Err(err) = &result {
            warn!(error = %err, "System metrics unavailable");
        }
        result.into()
    }

    async fn stage(&self, label: &str) -> Result<MemorySnapshot, String> {
        self.snapshot().await.map_err(|err| {
            warn!(snapshot = label, error = %err, "Memory snapshot failed");
            format!("{label} snapshot: {err}")
        })
    }

    /// Snapshot, burst `load`, snapshot, settle, snapshot.
    pub async fn profile(&self, load: &Operation) -> Availability<MemoryReport> {
        match self.run(load).await {
            Ok(report) => {
                info!(
                    growth_mb = report.growth_mb(),
                    peak_delta_bytes = report.peak_delta_bytes(),
                    "Memory profile complete"
                );
                Availability::Available(report)
            }
            Err(reason) => Availability::unavailable(reason),
        }
    }

    async fn run(&self, load: &Operation) -> Result<MemoryReport, String> {
        let initial = self.stage("initial").await?;

        let runner = PhaseRunner::new(self.target, self.profile);
        let (samples, wall_time) = runner
            .burst_samples(load, self.profile.memory_burst_size)
            .await;
        let peak = self.stage("peak").await?;

        tokio::time::sleep(self.profile.settle_delay()).await;
        let settled = self.stage("final").await?;

        Ok(MemoryReport {
            initial,
            peak,
            settled,
            load: BurstStats::from_samples(&samples, wall_time),
            settle_delay_ms: self.profile.settle_delay_ms,
        })
    }
}
