//! Errors that abort an audit run.
//!
//! Individual failed operations never surface here; they are recorded as
//! samples. Only conditions that make the whole run meaningless do.

use crate::config::ConfigError;
use crate::target::TargetError;
use loadscope_core::ReportError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for audit operations.
pub type Result<T> = std::result::Result<T, AuditError>;

/// Fatal audit errors.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The very first baseline call got no response at all.
    #[error("Target {target} is unreachable: {cause}")]
    Unreachable {
        /// Target description.
        target: String,
        /// What the first call reported.
        cause: String,
    },

    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The HTTP target could not be constructed.
    #[error("Target error: {0}")]
    Target(#[from] TargetError),

    /// Phase results were recorded inconsistently.
    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    /// A report artifact could not be read or written.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A report artifact could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AuditError {
    /// Wrap an I/O error with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AuditError::Io {
            path: path.into(),
            source,
        }
    }
}
