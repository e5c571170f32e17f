//! Markdown rendering of a benchmark report.
//!
//! The output reads fine in a terminal and pastes cleanly into an issue or
//! pull request. Findings and general best practices are rendered as two
//! separate lists.

use loadscope_core::memory::bytes_to_mb;
use loadscope_core::{
    Availability, BenchmarkReport, MemorySnapshot, OperationResult, PhaseResult, Recommendation,
};
use std::fmt::{self, Write};

/// Render the full report.
pub fn render_report(report: &BenchmarkReport) -> String {
    let mut output = String::new();
    // Writing into a String cannot fail.
    let _ = write_report(&mut output, report);
    output
}

fn write_report(out: &mut String, report: &BenchmarkReport) -> fmt::Result {
    writeln!(out, "# Performance Audit")?;
    writeln!(out)?;
    writeln!(out, "- Run: `{}`", report.run_id)?;
    writeln!(out, "- Started: {}", report.started_at.to_rfc3339())?;
    writeln!(out, "- Finished: {}", report.finished_at.to_rfc3339())?;
    writeln!(out, "- Target: {}", report.target)?;
    writeln!(out, "- Profile: {}", report.profile)?;
    writeln!(out, "- Samples: {}", report.total_samples())?;
    writeln!(out)?;

    write_phase(out, "Baseline", &report.baseline)?;
    write_phase(out, "Per-Operation Latency", &report.per_operation)?;
    write_phase(out, "Data-Heavy Operations", &report.data_heavy)?;
    write_cache_probes(out, report)?;
    write_memory(out, report)?;
    write_concurrency(out, report)?;
    write_rate_limit(out, report)?;
    write_system(out, report)?;
    write_recommendations(out, report)?;
    Ok(())
}

fn write_operation_table(out: &mut String, operations: &[OperationResult]) -> fmt::Result {
    let tracks_cache = operations.iter().any(|op| op.cache_hit_rate.is_some());
    write!(
        out,
        "| Operation | Avg (ms) | Min | Max | P50 | P95 | P99 | Success % | Error % | Samples |"
    )?;
    if tracks_cache {
        write!(out, " Cache hit % |")?;
    }
    writeln!(out)?;
    write!(out, "|---|---|---|---|---|---|---|---|---|---|")?;
    if tracks_cache {
        write!(out, "---|")?;
    }
    writeln!(out)?;

    for op in operations {
        let s = &op.stats;
        write!(
            out,
            "| {} | {:.2} | {:.2} | {:.2} | {:.2} | {:.2} | {:.2} | {:.2} | {:.2} | {} |",
            op.name,
            s.average_ms,
            s.min_ms,
            s.max_ms,
            s.p50_ms,
            s.p95_ms,
            s.p99_ms,
            s.success_rate,
            s.error_rate,
            s.sample_count
        )?;
        if tracks_cache {
            match op.cache_hit_rate {
                Some(rate) => write!(out, " {rate:.2} |")?,
                None => write!(out, " - |")?,
            }
        }
        writeln!(out)?;
    }
    writeln!(out)
}

fn write_phase(out: &mut String, title: &str, phase: &PhaseResult) -> fmt::Result {
    writeln!(out, "## {title}")?;
    writeln!(out)?;
    if phase.operations.is_empty() {
        writeln!(out, "_No operations measured._")?;
        return writeln!(out);
    }
    write_operation_table(out, &phase.operations)
}

fn write_cache_probes(out: &mut String, report: &BenchmarkReport) -> fmt::Result {
    writeln!(out, "## Cache Effectiveness")?;
    writeln!(out)?;
    let probes = report.cache_probes();
    if probes.is_empty() {
        writeln!(out, "_No cache probes run._")?;
        return writeln!(out);
    }

    writeln!(out, "| Operation | Cold (ms) | Warm (ms) | Speed-up % | Warm cached |")?;
    writeln!(out, "|---|---|---|---|---|")?;
    for probe in probes {
        let speedup = probe
            .speedup_percent
            .map(|v| format!("{v:.2}"))
            .unwrap_or_else(|| "n/a".to_string());
        writeln!(
            out,
            "| {} | {:.2} | {:.2} | {} | {} |",
            probe.operation, probe.cold_ms, probe.warm_ms, speedup, probe.warm_cached
        )?;
    }
    writeln!(out)
}

fn snapshot_row(out: &mut String, label: &str, snapshot: &MemorySnapshot) -> fmt::Result {
    writeln!(
        out,
        "| {} | {:.2} | {:.2} | {:.2} | {:.2} |",
        label,
        bytes_to_mb(snapshot.heap_used as i64),
        bytes_to_mb(snapshot.heap_total as i64),
        bytes_to_mb(snapshot.resident_set as i64),
        bytes_to_mb(snapshot.external as i64)
    )
}

fn write_memory(out: &mut String, report: &BenchmarkReport) -> fmt::Result {
    writeln!(out, "## Memory")?;
    writeln!(out)?;
    match &report.memory {
        Availability::Unavailable { reason } => {
            writeln!(out, "_Unavailable: {reason}_")?;
        }
        Availability::Available(memory) => {
            writeln!(
                out,
                "| Snapshot | Heap used (MB) | Heap total (MB) | RSS (MB) | External (MB) |"
            )?;
            writeln!(out, "|---|---|---|---|---|")?;
            snapshot_row(out, "initial", &memory.initial)?;
            snapshot_row(out, "peak", &memory.peak)?;
            snapshot_row(out, "final", &memory.settled)?;
            writeln!(out)?;
            writeln!(
                out,
                "Heap growth after {}ms settle: **{:.2} MB** (load burst of {} requests, {:.2}% success)",
                memory.settle_delay_ms,
                memory.growth_mb(),
                memory.load.concurrency,
                memory.load.success_rate
            )?;
        }
    }
    writeln!(out)
}

fn write_concurrency(out: &mut String, report: &BenchmarkReport) -> fmt::Result {
    writeln!(out, "## Concurrency Scaling")?;
    writeln!(out)?;
    let bursts: Vec<_> = report.concurrency.iter().filter_map(PhaseResult::burst).collect();
    if bursts.is_empty() {
        writeln!(out, "_No concurrency levels configured._")?;
        return writeln!(out);
    }

    writeln!(
        out,
        "| Concurrency | Successful | Failed | Success % | Wall time (ms) | Req/s |"
    )?;
    writeln!(out, "|---|---|---|---|---|---|")?;
    for burst in bursts {
        writeln!(
            out,
            "| {} | {} | {} | {:.2} | {:.2} | {:.2} |",
            burst.concurrency,
            burst.successful_requests,
            burst.failed_requests,
            burst.success_rate,
            burst.wall_time_ms,
            burst.requests_per_second
        )?;
    }
    writeln!(out)
}

fn write_rate_limit(out: &mut String, report: &BenchmarkReport) -> fmt::Result {
    writeln!(out, "## Rate-Limit Overhead")?;
    writeln!(out)?;
    match report.rate_limit_stats() {
        Some(stats) => {
            writeln!(out, "- Baseline average: {:.2}ms", stats.baseline_average_ms)?;
            writeln!(out, "- Rate-limited average: {:.2}ms", stats.limited_average_ms)?;
            writeln!(out, "- Overhead: {:.2}ms", stats.overhead_ms)?;
            writeln!(out, "- Throttled (429) responses: {}", stats.throttled_responses)?;
        }
        None => writeln!(out, "_Not measured._")?,
    }
    writeln!(out)
}

fn write_system(out: &mut String, report: &BenchmarkReport) -> fmt::Result {
    writeln!(out, "## System Metrics")?;
    writeln!(out)?;
    match &report.system {
        Availability::Unavailable { reason } => writeln!(out, "_Unavailable: {reason}_")?,
        Availability::Available(system) => {
            writeln!(out, "- Uptime: {:.1}s", system.uptime_secs)?;
            writeln!(
                out,
                "- Heap: {:.2} / {:.2} MB",
                bytes_to_mb(system.heap_used as i64),
                bytes_to_mb(system.heap_total as i64)
            )?;
            writeln!(out, "- RSS: {:.2} MB", bytes_to_mb(system.resident_set as i64))?;
            for (service, status) in &system.services {
                let status = status
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| status.to_string());
                writeln!(out, "- Service `{service}`: {status}")?;
            }
        }
    }
    writeln!(out)
}

fn write_list(out: &mut String, items: &[&Recommendation], empty: &str) -> fmt::Result {
    if items.is_empty() {
        return writeln!(out, "{empty}");
    }
    for item in items {
        writeln!(out, "- [{}] {}", item.priority, item.message)?;
    }
    Ok(())
}

fn write_recommendations(out: &mut String, report: &BenchmarkReport) -> fmt::Result {
    let findings: Vec<_> = report.findings().collect();
    let practices: Vec<_> = report.best_practices().collect();

    writeln!(out, "## Findings")?;
    writeln!(out)?;
    write_list(out, &findings, "_No issues detected._")?;
    writeln!(out)?;
    writeln!(out, "## General Best Practices")?;
    writeln!(out)?;
    write_list(out, &practices, "_None._")?;
    Ok(())
}
