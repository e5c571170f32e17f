// Copyright 2025 Loadscope Contributors
// SPDX-License-Identifier: Apache-2.0

//! Rule-based recommendations.
//!
//! Rules are a declarative table evaluated top to bottom. Each rule is
//! independent: a match never suppresses a later rule. The output keeps rule
//! evaluation order and is not sorted by priority, because reordering changes
//! the rendered report.
//!
//! | Rule                  | Priority | Fires when                                    |
//! |-----------------------|----------|-----------------------------------------------|
//! | `latency_critical`    | High     | operation average >= 1000ms                   |
//! | `latency_elevated`    | Medium   | 500ms <= operation average < 1000ms           |
//! | `error_rate`          | High     | operation error rate > 5%                     |
//! | `cache_speedup`       | Medium   | cold/warm speed-up < 30%                      |
//! | `memory_growth`       | High     | heap growth after settle > 10MB               |
//! | `concurrency`         | High     | success at highest concurrency level < 95%    |
//! | `rate_limit_overhead` | Low      | rate-limited path is > 10ms slower            |
//!
//! A fixed tail of best-practice advice follows the findings unconditionally.

use crate::phase::{CacheProbeResult, OperationResult};
use crate::report::BenchmarkReport;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Average latency at or above which an operation needs immediate work.
pub const CRITICAL_LATENCY_MS: f64 = 1000.0;
/// Average latency at or above which an operation should be optimized.
pub const ELEVATED_LATENCY_MS: f64 = 500.0;
/// Error rate above which failures need investigating.
pub const MAX_ERROR_RATE: f64 = 5.0;
/// Minimum acceptable cache speed-up.
pub const MIN_CACHE_SPEEDUP: f64 = 30.0;
/// Heap growth above which a leak is suspected.
pub const MAX_MEMORY_GROWTH_MB: f64 = 10.0;
/// Minimum acceptable success rate at the highest concurrency level.
pub const MIN_CONCURRENT_SUCCESS_RATE: f64 = 95.0;
/// Rate-limiting overhead above which middleware should be optimized.
pub const MAX_RATE_LIMIT_OVERHEAD_MS: f64 = 10.0;

/// Static advice appended to every report.
pub const BEST_PRACTICES: &[&str] = &[
    "Enable response compression (gzip/brotli) for large JSON payloads",
    "Use connection pooling for database and upstream HTTP clients",
    "Move hot caches to a distributed cache (e.g. Redis) to share them across instances",
    "Add application performance monitoring (APM) to track latency in production",
    "Wrap calls to external services in circuit breakers to contain failures",
];

/// How urgent a recommendation is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    /// Act now.
    High,
    /// Act soon.
    Medium,
    /// Worth a look.
    Low,
    /// General advice, not derived from measurement.
    Info,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Priority::High => "HIGH",
            Priority::Medium => "MEDIUM",
            Priority::Low => "LOW",
            Priority::Info => "INFO",
        };
        f.write_str(tag)
    }
}

/// Whether a recommendation came from measured data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    /// Produced by a threshold rule.
    Finding,
    /// Static advice.
    BestPractice,
}

/// One line of advice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Urgency tag.
    pub priority: Priority,
    /// Finding or static advice.
    pub kind: RecommendationKind,
    /// Identifier of the rule that produced it.
    pub rule: String,
    /// Human-readable message.
    pub message: String,
}

/// Latency bands for a single operation average.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatencyBand {
    /// Below [`ELEVATED_LATENCY_MS`].
    Acceptable,
    /// `[ELEVATED_LATENCY_MS, CRITICAL_LATENCY_MS)`.
    Elevated,
    /// At or above [`CRITICAL_LATENCY_MS`].
    Critical,
}

impl LatencyBand {
    /// Classify an average latency in milliseconds.
    pub fn classify(average_ms: f64) -> Self {
        if average_ms >= CRITICAL_LATENCY_MS {
            LatencyBand::Critical
        } else if average_ms >= ELEVATED_LATENCY_MS {
            LatencyBand::Elevated
        } else {
            LatencyBand::Acceptable
        }
    }
}

#[derive(Clone, Copy)]
enum Check {
    Operation {
        predicate: fn(&OperationResult) -> bool,
        message: fn(&OperationResult) -> String,
    },
    CacheProbe {
        predicate: fn(&CacheProbeResult) -> bool,
        message: fn(&CacheProbeResult) -> String,
    },
    Report(fn(&BenchmarkReport) -> Option<String>),
}

/// A threshold rule: predicate, message template and priority.
#[derive(Clone, Copy)]
pub struct Rule {
    id: &'static str,
    priority: Priority,
    check: Check,
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .finish()
    }
}

impl Rule {
    /// Rule evaluated once per measured operation.
    pub const fn per_operation(
        id: &'static str,
        priority: Priority,
        predicate: fn(&OperationResult) -> bool,
        message: fn(&OperationResult) -> String,
    ) -> Self {
        Self {
            id,
            priority,
            check: Check::Operation { predicate, message },
        }
    }

    /// Rule evaluated once per cache probe.
    pub const fn per_cache_probe(
        id: &'static str,
        priority: Priority,
        predicate: fn(&CacheProbeResult) -> bool,
        message: fn(&CacheProbeResult) -> String,
    ) -> Self {
        Self {
            id,
            priority,
            check: Check::CacheProbe { predicate, message },
        }
    }

    /// Rule evaluated once against the whole report.
    pub const fn on_report(
        id: &'static str,
        priority: Priority,
        check: fn(&BenchmarkReport) -> Option<String>,
    ) -> Self {
        Self {
            id,
            priority,
            check: Check::Report(check),
        }
    }

    /// Rule identifier.
    pub fn id(&self) -> &'static str {
        self.id
    }

    /// Priority of every finding this rule emits.
    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Evaluate the rule in isolation.
    pub fn apply(&self, report: &BenchmarkReport) -> Vec<Recommendation> {
        let messages: Vec<String> = match self.check {
            Check::Operation { predicate, message } => report
                .measured_operations()
                .filter(|op| predicate(op))
                .map(message)
                .collect(),
            Check::CacheProbe { predicate, message } => report
                .cache_probes()
                .iter()
                .filter(|probe| predicate(probe))
                .map(message)
                .collect(),
            Check::Report(check) => check(report).into_iter().collect(),
        };

        messages
            .into_iter()
            .map(|message| Recommendation {
                priority: self.priority,
                kind: RecommendationKind::Finding,
                rule: self.id.to_string(),
                message,
            })
            .collect()
    }
}

fn is_critical(op: &OperationResult) -> bool {
    !op.stats.is_empty() && LatencyBand::classify(op.stats.average_ms) == LatencyBand::Critical
}

fn is_elevated(op: &OperationResult) -> bool {
    !op.stats.is_empty() && LatencyBand::classify(op.stats.average_ms) == LatencyBand::Elevated
}

fn critical_message(op: &OperationResult) -> String {
    format!(
        "{}: average response time {:.2}ms requires immediate optimization",
        op.name, op.stats.average_ms
    )
}

fn elevated_message(op: &OperationResult) -> String {
    format!(
        "{}: average response time {:.2}ms, consider optimization",
        op.name, op.stats.average_ms
    )
}

/// `part / whole > percent`, compared on counts rather than rounded rates.
fn share_above(part: usize, whole: usize, percent: f64) -> bool {
    part as f64 * 100.0 > percent * whole as f64
}

/// `part / whole < percent`, compared on counts.
fn share_below(part: usize, whole: usize, percent: f64) -> bool {
    (part as f64 * 100.0) < percent * whole as f64
}

fn high_error_rate(op: &OperationResult) -> bool {
    share_above(op.stats.failed, op.stats.sample_count, MAX_ERROR_RATE)
}

fn error_rate_message(op: &OperationResult) -> String {
    format!(
        "{}: error rate {:.2}% ({} of {} requests failed), investigate failures",
        op.name, op.stats.error_rate, op.stats.failed, op.stats.sample_count
    )
}

fn weak_cache(probe: &CacheProbeResult) -> bool {
    probe
        .speedup_percent
        .is_some_and(|speedup| speedup < MIN_CACHE_SPEEDUP)
}

fn cache_message(probe: &CacheProbeResult) -> String {
    format!(
        "{}: cache speed-up only {:.1}% (cold {:.2}ms, warm {:.2}ms), optimize caching strategy",
        probe.operation,
        probe.speedup_percent.unwrap_or_default(),
        probe.cold_ms,
        probe.warm_ms
    )
}

fn memory_growth(report: &BenchmarkReport) -> Option<String> {
    let memory = report.memory.as_available()?;
    let growth = memory.growth_mb();
    (growth > MAX_MEMORY_GROWTH_MB).then(|| {
        format!(
            "Heap grew {growth:.2}MB after load and a {}ms settle delay, investigate memory leaks",
            memory.settle_delay_ms
        )
    })
}

fn concurrency_success(report: &BenchmarkReport) -> Option<String> {
    let burst = report.highest_concurrency()?;
    share_below(
        burst.successful_requests,
        burst.concurrency,
        MIN_CONCURRENT_SUCCESS_RATE,
    )
    .then(|| {
        format!(
            "Concurrency issues at {} concurrent requests: success rate {:.2}%",
            burst.concurrency, burst.success_rate
        )
    })
}

fn rate_limit_overhead(report: &BenchmarkReport) -> Option<String> {
    let stats = report.rate_limit_stats()?;
    (stats.overhead_ms > MAX_RATE_LIMIT_OVERHEAD_MS).then(|| {
        format!(
            "Rate limiting adds {:.2}ms per request over baseline, optimize middleware",
            stats.overhead_ms
        )
    })
}

/// The standard rule table, in evaluation order.
pub const STANDARD_RULES: &[Rule] = &[
    Rule::per_operation("latency_critical", Priority::High, is_critical, critical_message),
    Rule::per_operation("latency_elevated", Priority::Medium, is_elevated, elevated_message),
    Rule::per_operation("error_rate", Priority::High, high_error_rate, error_rate_message),
    Rule::per_cache_probe("cache_speedup", Priority::Medium, weak_cache, cache_message),
    Rule::on_report("memory_growth", Priority::High, memory_growth),
    Rule::on_report("concurrency", Priority::High, concurrency_success),
    Rule::on_report("rate_limit_overhead", Priority::Low, rate_limit_overhead),
];

/// Evaluates a rule table and appends static advice.
#[derive(Debug, Clone)]
pub struct RecommendationEngine {
    rules: Vec<Rule>,
    best_practices: Vec<&'static str>,
}

impl Default for RecommendationEngine {
    fn default() -> Self {
        Self::standard()
    }
}

impl RecommendationEngine {
    /// Engine with [`STANDARD_RULES`] and [`BEST_PRACTICES`].
    pub fn standard() -> Self {
        Self {
            rules: STANDARD_RULES.to_vec(),
            best_practices: BEST_PRACTICES.to_vec(),
        }
    }

    /// Engine with a custom rule table and no static advice.
    pub fn with_rules(rules: Vec<Rule>) -> Self {
        Self {
            rules,
            best_practices: Vec::new(),
        }
    }

    /// Rules in evaluation order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Apply every rule in order, then append the best-practice tail.
    pub fn evaluate(&self, report: &BenchmarkReport) -> Vec<Recommendation> {
        let mut recommendations: Vec<Recommendation> =
            self.rules.iter().flat_map(|rule| rule.apply(report)).collect();

        tracing::debug!(findings = recommendations.len(), "Recommendation rules evaluated");

        recommendations.extend(self.best_practices.iter().map(|advice| Recommendation {
            priority: Priority::Info,
            kind: RecommendationKind::BestPractice,
            rule: "best_practice".to_string(),
            message: (*advice).to_string(),
        }));
        recommendations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Availability, MemoryReport, MemorySnapshot};
    use crate::phase::{
        BurstStats, CacheProbeResult, Phase, PhaseExtras, PhaseResult, RateLimitStats,
    };
    use crate::report::tests::builder_with_all_phases;
    use crate::report::ReportBuilder;
    use crate::sample::{Outcome, Sample};
    use crate::stats::SummaryStat;
    use chrono::Utc;
    use std::time::Duration;

    const MB: u64 = 1024 * 1024;

    /// Operation over 10 000 samples with `error_rate` percent of them failed.
    fn op(name: &str, average_ms: f64, error_rate: f64) -> OperationResult {
        let sample_count = 10_000;
        let failed = (error_rate * 100.0).round() as usize;
        OperationResult {
            name: name.to_string(),
            stats: SummaryStat {
                average_ms,
                success_rate: 100.0 - error_rate,
                error_rate,
                successful: sample_count - failed,
                failed,
                sample_count,
                ..SummaryStat::default()
            },
            cache_hit_rate: None,
        }
    }

    fn report_with_operations(ops: Vec<OperationResult>) -> BenchmarkReport {
        let mut builder = ReportBuilder::new("http://localhost:3000", "gentle");
        let per_op = ops
            .into_iter()
            .fold(PhaseResult::new(Phase::PerOperation), PhaseResult::with_operation);
        builder.record_phase(per_op).unwrap();
        for phase in [
            Phase::Baseline,
            Phase::DataHeavy,
            Phase::CacheProbe,
            Phase::RateLimitOverhead,
        ] {
            builder.record_phase(PhaseResult::new(phase)).unwrap();
        }
        builder
            .record_memory(Availability::unavailable("not measured"))
            .unwrap();
        builder.build().unwrap()
    }

    fn rule(id: &str) -> Rule {
        *STANDARD_RULES.iter().find(|r| r.id() == id).unwrap()
    }

    fn snapshot(heap_mb: u64) -> MemorySnapshot {
        MemorySnapshot {
            resident_set: 100 * MB,
            heap_used: heap_mb * MB,
            heap_total: 64 * MB,
            external: 0,
            captured_at: Utc::now(),
        }
    }

    #[test]
    fn test_latency_bands_are_exclusive_and_exhaustive() {
        let mut average = 0.0;
        while average < 3000.0 {
            let band = LatencyBand::classify(average);
            let critical = band == LatencyBand::Critical;
            let elevated = band == LatencyBand::Elevated;
            assert_eq!(critical, average >= 1000.0, "avg {average}");
            assert_eq!(elevated, (500.0..1000.0).contains(&average), "avg {average}");
            assert!(!(critical && elevated));
            average += 0.5;
        }
    }

    #[test]
    fn test_latency_rules_at_boundaries() {
        let report = report_with_operations(vec![
            op("fast", 499.99, 0.0),
            op("edge_elevated", 500.0, 0.0),
            op("slowish", 999.99, 0.0),
            op("edge_critical", 1000.0, 0.0),
        ]);

        let critical = rule("latency_critical").apply(&report);
        assert_eq!(critical.len(), 1);
        assert!(critical[0].message.starts_with("edge_critical"));
        assert!(critical[0].message.contains("requires immediate optimization"));
        assert_eq!(critical[0].priority, Priority::High);

        let elevated = rule("latency_elevated").apply(&report);
        let names: Vec<&str> = elevated
            .iter()
            .map(|r| r.message.split(':').next().unwrap())
            .collect();
        assert_eq!(names, vec!["edge_elevated", "slowish"]);
        assert!(elevated[0].message.contains("consider optimization"));
    }

    #[test]
    fn test_error_rate_rule() {
        let report = report_with_operations(vec![op("a", 10.0, 5.0), op("b", 10.0, 5.01)]);
        let findings = rule("error_rate").apply(&report);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.starts_with("b:"));
        assert!(findings[0].message.contains("investigate failures"));
    }

    #[test]
    fn test_error_rate_rule_ignores_display_rounding() {
        let samples: Vec<Sample> = (0..1019)
            .map(|i| {
                if i < 51 {
                    Sample::failed(Duration::from_millis(2), "reset")
                } else {
                    Sample::from_outcome(Duration::from_millis(2), Outcome::status(200))
                }
            })
            .collect();
        let flaky = OperationResult::from_samples("flaky", &samples);
        // 51 / 1019 = 5.0049%, displayed as 5.00.
        assert_eq!(flaky.stats.error_rate, 5.0);

        let report = report_with_operations(vec![flaky]);
        let findings = rule("error_rate").apply(&report);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.starts_with("flaky:"));
    }

    #[test]
    fn test_cache_rule_skips_failed_probes() {
        let mut report = builder_with_all_phases().build().unwrap();
        report.cache_probe = PhaseResult::new(Phase::CacheProbe).with_extras(
            PhaseExtras::CacheProbes(vec![
                CacheProbeResult {
                    operation: "weak".into(),
                    cold_ms: 100.0,
                    warm_ms: 90.0,
                    warm_cached: true,
                    speedup_percent: Some(10.0),
                },
                CacheProbeResult {
                    operation: "good".into(),
                    cold_ms: 100.0,
                    warm_ms: 20.0,
                    warm_cached: true,
                    speedup_percent: Some(80.0),
                },
                CacheProbeResult {
                    operation: "broken".into(),
                    cold_ms: 100.0,
                    warm_ms: 20.0,
                    warm_cached: false,
                    speedup_percent: None,
                },
            ]),
        );

        let findings = rule("cache_speedup").apply(&report);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.starts_with("weak:"));
        assert!(findings[0].message.contains("optimize caching strategy"));
    }

    #[test]
    fn test_memory_rule_scenario() {
        let mut report = builder_with_all_phases().build().unwrap();
        report.memory = Availability::Available(MemoryReport {
            initial: snapshot(20),
            peak: snapshot(45),
            settled: snapshot(32),
            load: BurstStats::from_samples(&[], Duration::ZERO),
            settle_delay_ms: 5000,
        });

        let findings = rule("memory_growth").apply(&report);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("12.00MB"));
        assert!(findings[0].message.contains("investigate memory leaks"));

        if let Availability::Available(memory) = &mut report.memory {
            memory.settled = snapshot(30);
        }
        assert!(rule("memory_growth").apply(&report).is_empty());

        report.memory = Availability::unavailable("health endpoint down");
        assert!(rule("memory_growth").apply(&report).is_empty());
    }

    #[test]
    fn test_concurrency_rule_uses_highest_level() {
        let burst = |level: usize, failures: usize| {
            let samples: Vec<Sample> = (0..level)
                .map(|i| {
                    if i < failures {
                        Sample::failed(Duration::from_millis(1), "refused")
                    } else {
                        Sample::from_outcome(Duration::from_millis(1), Outcome::status(200))
                    }
                })
                .collect();
            PhaseResult::keyed(Phase::ConcurrencyScaling, format!("concurrency/{level}"))
                .with_extras(PhaseExtras::Burst(BurstStats::from_samples(
                    &samples,
                    Duration::from_millis(10),
                )))
        };

        let mut builder = builder_with_all_phases();
        builder.record_phase(burst(10, 5)).unwrap();
        builder.record_phase(burst(100, 6)).unwrap();
        let report = builder.build().unwrap();

        let findings = rule("concurrency").apply(&report);
        assert_eq!(findings.len(), 1);
        assert_eq!(
            findings[0].message,
            "Concurrency issues at 100 concurrent requests: success rate 94.00%"
        );
    }

    #[test]
    fn test_concurrency_rule_ignores_display_rounding() {
        // 18999 / 20000 = 94.995%, displayed as 95.00.
        let burst = BurstStats {
            concurrency: 20_000,
            successful_requests: 18_999,
            failed_requests: 1_001,
            success_rate: 95.0,
            wall_time_ms: 1_000.0,
            requests_per_second: 20_000.0,
        };
        let mut builder = builder_with_all_phases();
        builder
            .record_phase(
                PhaseResult::keyed(Phase::ConcurrencyScaling, "concurrency/20000")
                    .with_extras(PhaseExtras::Burst(burst)),
            )
            .unwrap();
        let report = builder.build().unwrap();
        assert_eq!(rule("concurrency").apply(&report).len(), 1);

        let mut builder = builder_with_all_phases();
        builder
            .record_phase(
                PhaseResult::keyed(Phase::ConcurrencyScaling, "concurrency/20")
                    .with_extras(PhaseExtras::Burst(BurstStats {
                        concurrency: 20,
                        successful_requests: 19,
                        failed_requests: 1,
                        success_rate: 95.0,
                        wall_time_ms: 10.0,
                        requests_per_second: 2_000.0,
                    })),
            )
            .unwrap();
        assert!(rule("concurrency")
            .apply(&builder.build().unwrap())
            .is_empty());
    }

    #[test]
    fn test_rate_limit_rule() {
        let mut report = builder_with_all_phases().build().unwrap();
        report.rate_limit = PhaseResult::new(Phase::RateLimitOverhead).with_extras(
            PhaseExtras::RateLimit(RateLimitStats {
                baseline_average_ms: 5.0,
                limited_average_ms: 20.0,
                overhead_ms: 15.0,
                throttled_responses: 0,
            }),
        );
        let findings = rule("rate_limit_overhead").apply(&report);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("optimize middleware"));
        assert_eq!(findings[0].priority, Priority::Low);
    }

    #[test]
    fn test_evaluation_order_is_rule_order_then_advice() {
        let report = report_with_operations(vec![
            op("elevated_first", 600.0, 0.0),
            op("critical_second", 1500.0, 20.0),
        ]);
        let recs = RecommendationEngine::standard().evaluate(&report);

        let rules: Vec<&str> = recs.iter().map(|r| r.rule.as_str()).collect();
        assert_eq!(
            &rules[..3],
            &["latency_critical", "latency_elevated", "error_rate"]
        );
        assert_eq!(recs.len(), 3 + BEST_PRACTICES.len());
        assert!(recs[3..]
            .iter()
            .all(|r| r.kind == RecommendationKind::BestPractice && r.priority == Priority::Info));
    }

    #[test]
    fn test_clean_report_gets_only_advice() {
        let report = report_with_operations(vec![op("fine", 20.0, 0.0)]);
        let report = report.with_recommendations(&RecommendationEngine::standard());
        assert_eq!(report.findings().count(), 0);
        assert_eq!(report.best_practices().count(), BEST_PRACTICES.len());
    }

    #[test]
    fn test_empty_operation_never_flags_latency() {
        let report = report_with_operations(vec![OperationResult::from_samples("idle", &[])]);
        let engine = RecommendationEngine::with_rules(STANDARD_RULES.to_vec());
        assert!(engine.evaluate(&report).is_empty());
    }
}
