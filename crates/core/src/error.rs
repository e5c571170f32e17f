// Copyright 2025 Loadscope Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error types shared by the core crate.

use crate::phase::Phase;
use thiserror::Error;

/// Errors raised while assembling a [`crate::BenchmarkReport`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReportError {
    /// A phase result was recorded twice under the same key.
    #[error("Phase result already recorded: {0}")]
    AlreadyRecorded(String),

    /// A mandatory phase never recorded a result.
    #[error("Missing phase result: {0}")]
    MissingPhase(Phase),

    /// The phase has a dedicated recorder and cannot go through `record_phase`.
    #[error("Phase {0} must be recorded through its dedicated method")]
    UnsupportedPhase(Phase),
}

/// Errors raised while reading the target's self-reported health signal.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HealthError {
    /// A required field is absent from the health body.
    #[error("Health signal is missing field: {0}")]
    MissingField(&'static str),

    /// A field is present but has the wrong shape.
    #[error("Health signal field {field} is malformed: {reason}")]
    Malformed {
        /// Path of the offending field.
        field: &'static str,
        /// Decoder message.
        reason: String,
    },
}
