//! Audit engine for loadscope.
//!
//! This crate drives a [`Target`] through the audit phases and assembles a
//! [`loadscope_core::BenchmarkReport`].
//!
//! # Quick Start
//!
//! ```no_run
//! use loadscope_benchmarks::{run_audit, AuditConfig};
//!
//! # async fn example() -> loadscope_benchmarks::Result<()> {
//! let config = AuditConfig::load(None)?;
//! let report = run_audit(&config).await?;
//!
//! for finding in report.findings() {
//!     println!("[{}] {}", finding.priority, finding.message);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`config`] - Profiles, operation catalogue and layered loading
//! - [`target`] - The `Target` trait and its HTTP implementation
//! - [`runner`] - Serial-paced, cache-probe and burst load shapes
//! - [`profiler`] - Memory snapshots around a load burst
//! - [`orchestrator`] - Stage sequencing and report assembly
//! - [`markdown`] - Human-readable report rendering
//! - [`io`] - Report artifacts on disk

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod io;
pub mod markdown;
pub mod orchestrator;
pub mod profiler;
pub mod runner;
pub mod target;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{
    AuditConfig, BenchmarkProfile, ConfigError, OperationCatalog, ProfileName, ProfileOverrides,
};
pub use error::{AuditError, Result};
pub use orchestrator::{BenchmarkOrchestrator, Stage};
pub use profiler::MemoryProfiler;
pub use runner::PhaseRunner;
pub use target::{HttpTarget, Method, Operation, Target, TargetError};

use loadscope_core::BenchmarkReport;

/// Run a complete audit against the HTTP target described by `config`.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the target does not
/// answer the first baseline call.
pub async fn run_audit(config: &AuditConfig) -> Result<BenchmarkReport> {
    BenchmarkOrchestrator::from_config(config)?.run().await
}
