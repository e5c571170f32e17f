//! Load shapes.
//!
//! [`PhaseRunner`] implements the three ways an audit drives the target:
//!
//! - **serial-paced**: one call at a time, pausing after every `pace_every`-th
//!   call so target-side abuse protection is not tripped
//! - **cache probe**: a cold call immediately followed by a warm call of the
//!   same operation
//! - **concurrent burst**: `C` calls launched together and awaited as a
//!   barrier; individual failures are recorded, never fatal
//!
//! Every shape returns exactly one [`PhaseResult`] per invocation.

use crate::config::BenchmarkProfile;
use crate::target::{Operation, Target};
use futures::future::join_all;
use loadscope_core::phase::{BurstStats, CacheProbeResult, RateLimitStats};
use loadscope_core::{OperationResult, Phase, PhaseExtras, PhaseResult, Sample, Sampler, SummaryStat};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Counts serial calls and sleeps after every `every`-th one.
#[derive(Debug)]
pub struct Pacer {
    every: u32,
    delay: Duration,
    calls: u64,
}

impl Pacer {
    /// Pause for `delay` after every `every` calls. `every == 0` disables pacing.
    pub fn new(every: u32, delay: Duration) -> Self {
        Self {
            every,
            delay,
            calls: 0,
        }
    }

    /// Record one call, sleeping if it completes a pacing period.
    pub async fn tick(&mut self) {
        self.calls += 1;
        if self.every > 0 && !self.delay.is_zero() && self.calls % u64::from(self.every) == 0 {
            tokio::time::sleep(self.delay).await;
        }
    }

    /// Calls recorded so far.
    pub fn calls(&self) -> u64 {
        self.calls
    }
}

/// Executes load shapes against a target.
pub struct PhaseRunner<'a> {
    target: &'a dyn Target,
    profile: &'a BenchmarkProfile,
}

impl<'a> PhaseRunner<'a> {
    /// Runner for `target` using the pacing and timeouts of `profile`.
    pub fn new(target: &'a dyn Target, profile: &'a BenchmarkProfile) -> Self {
        Self { target, profile }
    }

    /// A pacer configured from the profile.
    pub fn pacer(&self) -> Pacer {
        Pacer::new(self.profile.pace_every, self.profile.pacing_delay())
    }

    /// Measure a single call of `operation`.
    pub async fn sample(&self, operation: &Operation, default_timeout: Duration) -> Sample {
        let sampler = Sampler::with_timeout(operation.timeout_or(default_timeout));
        let sample = sampler.measure(|| self.target.call(operation)).await;
        if let Some(error) = &sample.error {
            debug!(operation = %operation.name, error = %error, "Sample failed");
        } else if !sample.succeeded() {
            debug!(operation = %operation.name, status = ?sample.status, "Sample returned error status");
        }
        sample
    }

    /// Issue `iterations` calls of `operation` one at a time, paced by `pacer`.
    pub async fn serial_samples(
        &self,
        operation: &Operation,
        iterations: u32,
        default_timeout: Duration,
        pacer: &mut Pacer,
    ) -> Vec<Sample> {
        let mut samples = Vec::with_capacity(iterations as usize);
        for _ in 0..iterations {
            samples.push(self.sample(operation, default_timeout).await);
            pacer.tick().await;
        }
        samples
    }

    /// Serial-paced shape over a set of operations.
    pub async fn serial_paced(
        &self,
        phase: Phase,
        operations: &[Operation],
        iterations: u32,
        default_timeout: Duration,
        track_cache: bool,
    ) -> PhaseResult {
        let mut pacer = self.pacer();
        let mut result = PhaseResult::new(phase);

        for operation in operations {
            let samples = self
                .serial_samples(operation, iterations, default_timeout, &mut pacer)
                .await;
            let summary = if track_cache {
                OperationResult::with_cache_tracking(&operation.name, &samples)
            } else {
                OperationResult::from_samples(&operation.name, &samples)
            };
            info!(
                phase = %phase,
                operation = %operation.name,
                average_ms = summary.stats.average_ms,
                success_rate = summary.stats.success_rate,
                "Operation measured"
            );
            result = result.with_operation(summary);
        }
        result
    }

    /// Cold-then-warm probe of each cache-sensitive operation.
    pub async fn cache_probe(&self, operations: &[Operation]) -> PhaseResult {
        let mut pacer = self.pacer();
        let timeout = self.profile.request_timeout();
        let mut probes = Vec::with_capacity(operations.len());
        let mut result = PhaseResult::new(Phase::CacheProbe);

        for operation in operations {
            let cold = self.sample(operation, timeout).await;
            let warm = self.sample(operation, timeout).await;
            pacer.tick().await;

            let probe = CacheProbeResult::from_pair(&operation.name, &cold, &warm);
            info!(
                operation = %operation.name,
                cold_ms = probe.cold_ms,
                warm_ms = probe.warm_ms,
                speedup_percent = ?probe.speedup_percent,
                "Cache probe complete"
            );
            result = result.with_operation(OperationResult::with_cache_tracking(
                &operation.name,
                &[cold, warm],
            ));
            probes.push(probe);
        }
        result.with_extras(PhaseExtras::CacheProbes(probes))
    }

    /// Launch `concurrency` calls at once and wait for every one of them.
    ///
    /// Returns the samples in launch order and the wall time of the barrier.
    pub async fn burst_samples(
        &self,
        operation: &Operation,
        concurrency: usize,
    ) -> (Vec<Sample>, Duration) {
        let start = Instant::now();
        let samples = join_all(
            (0..concurrency).map(|_| self.sample(operation, self.profile.request_timeout())),
        )
        .await;
        (samples, start.elapsed())
    }

    /// Concurrent-burst shape at one level, keyed `concurrency/<level>`.
    pub async fn concurrent_burst(&self, operation: &Operation, concurrency: usize) -> PhaseResult {
        let (samples, wall_time) = self.burst_samples(operation, concurrency).await;
        let burst = BurstStats::from_samples(&samples, wall_time);
        info!(
            concurrency,
            successful = burst.successful_requests,
            failed = burst.failed_requests,
            requests_per_second = burst.requests_per_second,
            "Burst complete"
        );

        PhaseResult::keyed(Phase::ConcurrencyScaling, format!("concurrency/{concurrency}"))
            .with_operation(OperationResult::from_samples(&operation.name, &samples))
            .with_extras(PhaseExtras::Burst(burst))
    }

    /// Fixed-iteration calls through the rate-limited path, compared with baseline.
    pub async fn rate_limit_overhead(
        &self,
        operation: &Operation,
        baseline: &SummaryStat,
    ) -> PhaseResult {
        let mut pacer = self.pacer();
        let samples = self
            .serial_samples(
                operation,
                self.profile.rate_limit_iterations,
                self.profile.baseline_timeout(),
                &mut pacer,
            )
            .await;
        let stats = RateLimitStats::compute(baseline, &samples);
        info!(
            overhead_ms = stats.overhead_ms,
            throttled = stats.throttled_responses,
            "Rate-limit overhead measured"
        );

        PhaseResult::new(Phase::RateLimitOverhead)
            .with_operation(OperationResult::from_samples(&operation.name, &samples))
            .with_extras(PhaseExtras::RateLimit(stats))
    }
}
