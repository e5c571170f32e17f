// Copyright 2025 Loadscope Contributors
// SPDX-License-Identifier: Apache-2.0

//! Core types for the loadscope performance audit engine.
//!
//! This crate holds everything that does not need to talk to the network:
//! the sample and report data model, the sampler that times a single
//! operation, the statistics reducer and the rule-based recommendation
//! engine.
//!
//! # Modules
//!
//! - [`sample`] - One measured attempt at an operation, and the [`Sampler`] that produces it
//! - [`stats`] - Reduction of samples into a [`SummaryStat`]
//! - [`phase`] - Per-phase results and their phase-specific extras
//! - [`memory`] - Memory snapshots and health-signal parsing
//! - [`report`] - The [`BenchmarkReport`] aggregate and its builder
//! - [`recommend`] - Threshold rules turning a report into recommendations

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod error;
pub mod memory;
pub mod phase;
pub mod recommend;
pub mod report;
pub mod sample;
pub mod stats;

pub use error::{HealthError, ReportError};
pub use memory::{Availability, MemoryReport, MemorySnapshot, SystemMetrics};
pub use phase::{
    BurstStats, CacheProbeResult, OperationResult, Phase, PhaseExtras, PhaseResult,
    RateLimitStats,
};
pub use recommend::{Priority, Recommendation, RecommendationEngine, RecommendationKind, Rule};
pub use report::{BenchmarkReport, ReportBuilder};
pub use sample::{Outcome, Sample, Sampler};
pub use stats::SummaryStat;
