// Copyright 2025 Loadscope Contributors
// SPDX-License-Identifier: Apache-2.0

//! Memory snapshots taken from the target's self-reported health signal.
//!
//! The health body is expected to look like:
//!
//! ```json
//! {
//!   "memory": { "rss": 0, "heapTotal": 0, "heapUsed": 0, "external": 0 },
//!   "uptime": 12.5,
//!   "services": { "database": "up" }
//! }
//! ```
//!
//! Missing or malformed fields produce a [`HealthError`], which callers turn
//! into [`Availability::Unavailable`] rather than failing the run.

use crate::error::HealthError;
use crate::phase::BurstStats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Bytes per megabyte used for every MB figure in a report.
pub const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// A sub-report that may be missing when the target's metrics cannot be read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Availability<T> {
    /// The sub-report was captured.
    Available(T),
    /// The sub-report could not be captured.
    Unavailable {
        /// Why the data is missing.
        reason: String,
    },
}

impl<T> Availability<T> {
    /// Mark a sub-report unavailable.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Availability::Unavailable {
            reason: reason.into(),
        }
    }

    /// Borrow the captured value, if any.
    pub fn as_available(&self) -> Option<&T> {
        match self {
            Availability::Available(value) => Some(value),
            Availability::Unavailable { .. } => None,
        }
    }

    /// True when the sub-report was captured.
    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Available(_))
    }
}

impl<T, E: std::fmt::Display> From<Result<T, E>> for Availability<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Availability::Available(value),
            Err(err) => Availability::unavailable(err.to_string()),
        }
    }
}

/// Point-in-time resource usage of the target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    /// Resident set size in bytes.
    pub resident_set: u64,
    /// Heap in use in bytes.
    pub heap_used: u64,
    /// Heap reserved in bytes.
    pub heap_total: u64,
    /// Memory held outside the heap in bytes.
    pub external: u64,
    /// When the snapshot was read.
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HealthMemory {
    rss: u64,
    heap_total: u64,
    heap_used: u64,
    external: u64,
}

fn health_memory(health: &Value) -> Result<HealthMemory, HealthError> {
    let memory = health
        .get("memory")
        .ok_or(HealthError::MissingField("memory"))?;
    serde_json::from_value(memory.clone()).map_err(|e| HealthError::Malformed {
        field: "memory",
        reason: e.to_string(),
    })
}

impl MemorySnapshot {
    /// Read a snapshot out of a health body.
    pub fn from_health(health: &Value, captured_at: DateTime<Utc>) -> Result<Self, HealthError> {
        let memory = health_memory(health)?;
        Ok(Self {
            resident_set: memory.rss,
            heap_used: memory.heap_used,
            heap_total: memory.heap_total,
            external: memory.external,
            captured_at,
        })
    }
}

/// Signed heap growth in bytes between two snapshots.
pub fn growth(initial: &MemorySnapshot, last: &MemorySnapshot) -> i64 {
    last.heap_used as i64 - initial.heap_used as i64
}

/// Convert a byte count to megabytes.
pub fn bytes_to_mb(bytes: i64) -> f64 {
    bytes as f64 / BYTES_PER_MB
}

/// Result of the memory phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryReport {
    /// Before the load burst.
    pub initial: MemorySnapshot,
    /// Right after the load burst.
    pub peak: MemorySnapshot,
    /// After the settle delay.
    #[serde(rename = "final")]
    pub settled: MemorySnapshot,
    /// The load burst generated between the initial and peak snapshots.
    pub load: BurstStats,
    /// Delay between the peak and final snapshots.
    pub settle_delay_ms: u64,
}

impl MemoryReport {
    /// Heap growth that survived the settle delay (`final - initial`).
    pub fn growth_bytes(&self) -> i64 {
        growth(&self.initial, &self.settled)
    }

    /// [`Self::growth_bytes`] in megabytes.
    pub fn growth_mb(&self) -> f64 {
        bytes_to_mb(self.growth_bytes())
    }

    /// Heap added by the burst (`peak - initial`).
    pub fn peak_delta_bytes(&self) -> i64 {
        growth(&self.initial, &self.peak)
    }

    /// Heap released during the settle delay (`peak - final`).
    pub fn reclaimed_bytes(&self) -> i64 {
        growth(&self.settled, &self.peak)
    }
}

/// Process-level metrics reported by the target at the end of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemMetrics {
    /// Process uptime in seconds.
    pub uptime_secs: f64,
    /// Resident set size in bytes.
    pub resident_set: u64,
    /// Heap in use in bytes.
    pub heap_used: u64,
    /// Heap reserved in bytes.
    pub heap_total: u64,
    /// Memory held outside the heap in bytes.
    pub external: u64,
    /// Dependency status map as reported by the target.
    #[serde(default)]
    pub services: Map<String, Value>,
}

impl SystemMetrics {
    /// Read system metrics out of a health body.
    pub fn from_health(health: &Value) -> Result<Self, HealthError> {
        let memory = health_memory(health)?;
        let uptime_secs = health
            .get("uptime")
            .ok_or(HealthError::MissingField("uptime"))?
            .as_f64()
            .ok_or_else(|| HealthError::Malformed {
                field: "uptime",
                reason: "expected a number".to_string(),
            })?;
        let services = health
            .get("services")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        Ok(Self {
            uptime_secs,
            resident_set: memory.rss,
            heap_used: memory.heap_used,
            heap_total: memory.heap_total,
            external: memory.external,
            services,
        })
    }
}
