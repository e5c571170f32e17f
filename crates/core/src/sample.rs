// Copyright 2025 Loadscope Contributors
// SPDX-License-Identifier: Apache-2.0

//! Samples and the sampler that records them.
//!
//! A [`Sample`] is produced exactly once per attempted operation. The
//! [`Sampler`] never fails: errors and timeouts of the wrapped operation end
//! up inside the sample instead of being propagated.

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Status codes at or above this value count as failed samples.
pub const FAILURE_STATUS_THRESHOLD: u16 = 400;

/// What the target answered for one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Outcome {
    /// Response status code.
    pub status: u16,
    /// Response body size in bytes.
    pub payload_size: u64,
    /// Whether the response body declared itself served from cache.
    pub cached: bool,
}

impl Outcome {
    /// Create an outcome with the given status and no body.
    pub fn status(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// Set the payload size.
    pub fn with_payload(mut self, payload_size: u64) -> Self {
        self.payload_size = payload_size;
        self
    }

    /// Set the cache flag.
    pub fn with_cached(mut self, cached: bool) -> Self {
        self.cached = cached;
        self
    }
}

/// One measured attempt at a single operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Wall time between issuing the operation and its completion or failure.
    pub elapsed: Duration,
    /// Response status, absent when no response was received.
    pub status: Option<u16>,
    /// Response body size in bytes.
    pub payload_size: u64,
    /// Cache flag reported by the target.
    pub cached: bool,
    /// Failure description, if the operation did not produce a response.
    pub error: Option<String>,
}

impl Sample {
    /// Sample for an operation that produced a response.
    pub fn from_outcome(elapsed: Duration, outcome: Outcome) -> Self {
        Self {
            elapsed,
            status: Some(outcome.status),
            payload_size: outcome.payload_size,
            cached: outcome.cached,
            error: None,
        }
    }

    /// Sample for an operation that errored or timed out.
    pub fn failed(elapsed: Duration, error: impl Into<String>) -> Self {
        Self {
            elapsed,
            status: None,
            payload_size: 0,
            cached: false,
            error: Some(error.into()),
        }
    }

    /// True when a response arrived with a status below the failure threshold.
    pub fn succeeded(&self) -> bool {
        matches!(self.status, Some(status) if status < FAILURE_STATUS_THRESHOLD)
    }

    /// True when the target answered at all, whatever the status.
    pub fn reached_target(&self) -> bool {
        self.status.is_some()
    }

    /// Elapsed time in fractional milliseconds.
    pub fn elapsed_ms(&self) -> f64 {
        duration_ms(self.elapsed)
    }
}

/// Convert a duration to fractional milliseconds.
pub fn duration_ms(duration: Duration) -> f64 {
    duration.as_nanos() as f64 / 1_000_000.0
}

/// Times a single operation against the target.
///
/// Timing uses tokio's clock so that paused-time tests see exact durations.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sampler {
    timeout: Option<Duration>,
}

impl Sampler {
    /// Sampler without a per-call timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sampler that abandons the operation after `timeout` and records a failure.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }

    /// Configured per-call timeout.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Invoke `operation` once and record how long it took and how it ended.
    pub async fn measure<F, Fut, E>(&self, operation: F) -> Sample
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Outcome, E>>,
        E: Display,
    {
        let start = Instant::now();
        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, operation()).await {
                Ok(result) => result,
                Err(_) => {
                    return Sample::failed(
                        start.elapsed(),
                        format!("timed out after {}ms", limit.as_millis()),
                    )
                }
            },
            None => operation().await,
        };
        let elapsed = start.elapsed();

        match result {
            Ok(outcome) => Sample::from_outcome(elapsed, outcome),
            Err(err) => Sample::failed(elapsed, err.to_string()),
        }
    }
}
