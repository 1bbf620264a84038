//! Driver Error Taxonomy
//!
//! Errors raised while deciding on or executing a promotion. A skipped or
//! declined promotion is an outcome, not an error, and lives in `record`.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DriverError {
    /// Filename carries no `v<dotted-integers>` token that parses
    #[error("Invalid version in {file_name:?}: {reason}")]
    InvalidVersion { file_name: String, reason: String },

    #[error("Filesystem {operation} failed for {}: {source}", path.display())]
    Filesystem {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Archive already holds a different file under the same name
    #[error("Archive already contains a different {}", path.display())]
    ArchiveConflict { path: PathBuf },

    #[error("Configuration missing: {0}")]
    ConfigurationMissing(String),
}

impl DriverError {
    pub fn invalid_version(file_name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidVersion {
            file_name: file_name.to_string(),
            reason: reason.into(),
        }
    }

    pub fn filesystem(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Filesystem {
            operation,
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, DriverError>;
