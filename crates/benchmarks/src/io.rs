//! Reading and writing report artifacts.
//!
//! Nothing in the audit writes to disk unless one of these functions is
//! called explicitly.

use crate::error::{AuditError, Result};
use crate::markdown;
use loadscope_core::BenchmarkReport;
use std::fs;
use std::path::Path;

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|e| AuditError::io(parent, e))
        }
        _ => Ok(()),
    }
}

/// Write the full report as pretty-printed JSON.
pub fn write_report_json(report: &BenchmarkReport, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    ensure_parent(path)?;
    let json = serde_json::to_string_pretty(report)?;
    fs::write(path, json).map_err(|e| AuditError::io(path, e))?;
    tracing::info!(path = %path.display(), "Report written");
    Ok(())
}

/// Reload a report written by [`write_report_json`].
pub fn read_report_json(path: impl AsRef<Path>) -> Result<BenchmarkReport> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| AuditError::io(path, e))?;
    Ok(serde_json::from_str(&content)?)
}

/// Write the markdown rendering of the report.
pub fn write_report_markdown(report: &BenchmarkReport, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    ensure_parent(path)?;
    fs::write(path, markdown::render_report(report)).map_err(|e| AuditError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use loadscope_core::{Availability, Phase, PhaseResult, ReportBuilder};
    use std::path::PathBuf;

    fn minimal_report() -> BenchmarkReport {
        let mut builder = ReportBuilder::new("http://localhost:3000/", "exhaustive");
        for phase in [
            Phase::Baseline,
            Phase::PerOperation,
            Phase::DataHeavy,
            Phase::CacheProbe,
            Phase::RateLimitOverhead,
        ] {
            builder.record_phase(PhaseResult::new(phase)).unwrap();
        }
        builder
            .record_memory(Availability::unavailable("health offline"))
            .unwrap();
        builder.build().unwrap()
    }

    fn scratch_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("loadscope-io-{}-{}", name, std::process::id()))
    }

    #[test]
    fn test_write_and_read_report_json() {
        let dir = scratch_dir("json");
        let path = dir.join("nested").join("report.json");
        let report = minimal_report();

        write_report_json(&report, &path).unwrap();
        let loaded = read_report_json(&path).unwrap();
        assert_eq!(loaded.run_id, report.run_id);
        assert_eq!(loaded.memory, report.memory);

        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_read_missing_report_names_path() {
        let path = scratch_dir("missing").join("absent.json");
        let err = read_report_json(&path).unwrap_err();
        assert!(matches!(err, AuditError::Io { .. }));
        assert!(err.to_string().contains("absent.json"));
    }

    #[test]
    fn test_write_report_markdown() {
        let dir = scratch_dir("md");
        let path = dir.join("report.md");
        write_report_markdown(&minimal_report(), &path).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("_Unavailable: health offline_"));
        fs::remove_dir_all(dir).ok();
    }
}
