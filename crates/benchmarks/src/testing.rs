//! Deterministic in-memory target for unit tests.
//!
//! Latency is simulated with `tokio::time::sleep`, so tests run under paused
//! time see exact elapsed values. Every call after the first of an operation
//! is flagged as cached.

use crate::target::{Operation, Target, TargetError};
use async_trait::async_trait;
use loadscope_core::Outcome;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Default, Clone)]
struct Script {
    latencies: Vec<Duration>,
    status: Option<u16>,
    fail_every: Option<u64>,
    fail_first: u64,
    calls: u64,
}

impl Script {
    fn latency(&self, index: u64) -> Duration {
        match self.latencies.len() {
            0 => Duration::ZERO,
            n => self.latencies[(index as usize).min(n - 1)],
        }
    }

    fn fails(&self, index: u64) -> bool {
        index < self.fail_first || matches!(self.fail_every, Some(k) if (index + 1) % k == 0)
    }
}

/// Build a health body with the given heap figure.
pub(crate) fn health_body(heap_used: u64) -> Value {
    json!({
        "status": "ok",
        "uptime": 42.5,
        "memory": {
            "rss": heap_used * 2,
            "heapTotal": heap_used + 1024,
            "heapUsed": heap_used,
            "external": 2048
        },
        "services": { "database": "up", "cache": "up" }
    })
}

pub(crate) struct ScriptedTarget {
    scripts: Mutex<HashMap<String, Script>>,
    unreachable: bool,
    health: Mutex<Vec<Result<Value, String>>>,
    health_calls: Mutex<usize>,
}

impl ScriptedTarget {
    pub(crate) fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            unreachable: false,
            health: Mutex::new(vec![Ok(health_body(10 * 1024 * 1024))]),
            health_calls: Mutex::new(0),
        }
    }

    fn script(self, name: &str, edit: impl FnOnce(&mut Script)) -> Self {
        edit(self
            .scripts
            .lock()
            .unwrap()
            .entry(name.to_string())
            .or_default());
        self
    }

    pub(crate) fn with_latency(self, name: &str, latency: Duration) -> Self {
        self.script(name, |s| s.latencies = vec![latency])
    }

    /// Latency per call index; the last entry repeats.
    pub(crate) fn with_latency_sequence(self, name: &str, latencies: Vec<Duration>) -> Self {
        self.script(name, |s| s.latencies = latencies)
    }

    pub(crate) fn with_status(self, name: &str, status: u16) -> Self {
        self.script(name, |s| s.status = Some(status))
    }

    /// Every `k`-th call (1-based) fails without a response.
    pub(crate) fn failing_every(self, name: &str, k: u64) -> Self {
        self.script(name, |s| s.fail_every = Some(k))
    }

    /// The first `n` calls fail without a response.
    pub(crate) fn failing_first(self, name: &str, n: u64) -> Self {
        self.script(name, |s| s.fail_first = n)
    }

    /// No call ever gets a response.
    pub(crate) fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    /// Health bodies per read; the last entry repeats.
    pub(crate) fn with_health_sequence(self, bodies: Vec<Result<Value, String>>) -> Self {
        *self.health.lock().unwrap() = bodies;
        self
    }

    pub(crate) fn calls(&self, name: &str) -> u64 {
        self.scripts
            .lock()
            .unwrap()
            .get(name)
            .map(|s| s.calls)
            .unwrap_or(0)
    }

    pub(crate) fn total_calls(&self) -> u64 {
        self.scripts.lock().unwrap().values().map(|s| s.calls).sum()
    }

    pub(crate) fn health_reads(&self) -> usize {
        *self.health_calls.lock().unwrap()
    }
}

#[async_trait]
impl Target for ScriptedTarget {
    fn describe(&self) -> String {
        "scripted://target".to_string()
    }

    async fn call(&self, operation: &Operation) -> Result<Outcome, TargetError> {
        let (latency, fails, status, index) = {
            let mut scripts = self.scripts.lock().unwrap();
            let script = scripts.entry(operation.name.clone()).or_default();
            let index = script.calls;
            script.calls += 1;
            (
                script.latency(index),
                self.unreachable || script.fails(index),
                script.status.unwrap_or(200),
                index,
            )
        };

        tokio::time::sleep(latency).await;
        if fails {
            return Err(TargetError::Other("connection refused".to_string()));
        }
        Ok(Outcome::status(status)
            .with_payload(64)
            .with_cached(index > 0))
    }

    async fn health(&self) -> Result<Value, TargetError> {
        let index = {
            let mut calls = self.health_calls.lock().unwrap();
            *calls += 1;
            *calls - 1
        };
        let bodies = self.health.lock().unwrap();
        let body = bodies
            .get(index)
            .or_else(|| bodies.last())
            .cloned()
            .unwrap_or_else(|| Err("no health body".to_string()));
        body.map_err(TargetError::Other)
    }
}
