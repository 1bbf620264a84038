//! Promotion Records
//!
//! The outcome of one vendor run, handed to the journal and the CLI. The
//! engine itself never persists these.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use super::error::DriverError;
use super::version::Version;

/// Why a run ended without touching the stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// New holds nothing for this vendor
    NoCandidate,
    /// Candidate is not newer than the current driver
    NotNewer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    InvalidVersion,
    Filesystem,
    Configuration,
    /// The vendor's worker died before producing an outcome
    Internal,
}

impl From<&DriverError> for FailureKind {
    fn from(err: &DriverError) -> Self {
        match err {
            DriverError::InvalidVersion { .. } => Self::InvalidVersion,
            DriverError::Filesystem { .. } | DriverError::ArchiveConflict { .. } => Self::Filesystem,
            DriverError::ConfigurationMissing(_) => Self::Configuration,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum PromotionResult {
    Promoted,
    Skipped {
        reason: SkipReason,
    },
    Declined,
    Failed {
        kind: FailureKind,
        cause: String,
        /// Set when the old driver reached Archive but the candidate never
        /// reached Active; this is the recovery point.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        archived: Option<PathBuf>,
    },
}

impl PromotionResult {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Promoted => "promoted",
            Self::Skipped { .. } => "skipped",
            Self::Declined => "declined",
            Self::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionRecord {
    pub vendor: String,
    pub from_version: Option<Version>,
    pub to_version: Option<Version>,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub result: PromotionResult,
    /// SHA-256 of the driver now in Active
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

impl PromotionRecord {
    fn with_result(
        vendor: &str,
        from_version: Option<Version>,
        to_version: Option<Version>,
        result: PromotionResult,
    ) -> Self {
        Self {
            vendor: vendor.to_string(),
            from_version,
            to_version,
            timestamp: Utc::now(),
            result,
            digest: None,
        }
    }

    pub fn promoted(vendor: &str, from: Option<Version>, to: Version, digest: Option<String>) -> Self {
        let mut record = Self::with_result(vendor, from, Some(to), PromotionResult::Promoted);
        record.digest = digest;
        record
    }

    pub fn skipped(vendor: &str, from: Option<Version>, to: Option<Version>, reason: SkipReason) -> Self {
        Self::with_result(vendor, from, to, PromotionResult::Skipped { reason })
    }

    pub fn declined(vendor: &str, from: Option<Version>, to: Version) -> Self {
        Self::with_result(vendor, from, Some(to), PromotionResult::Declined)
    }

    pub fn failed(
        vendor: &str,
        from: Option<Version>,
        to: Option<Version>,
        err: &DriverError,
        archived: Option<PathBuf>,
    ) -> Self {
        let result = PromotionResult::Failed {
            kind: FailureKind::from(err),
            cause: err.to_string(),
            archived,
        };
        Self::with_result(vendor, from, to, result)
    }

    /// Failure that did not come from a [`DriverError`]
    pub fn failed_internal(vendor: &str, cause: impl Into<String>) -> Self {
        let result = PromotionResult::Failed {
            kind: FailureKind::Internal,
            cause: cause.into(),
            archived: None,
        };
        Self::with_result(vendor, None, None, result)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.result, PromotionResult::Failed { .. })
    }
}

impl fmt::Display for PromotionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: &Option<Version>| v.as_ref().map_or_else(|| "-".to_string(), |v| v.to_string());
        write!(
            f,
            "{}: {} ({} -> {})",
            self.vendor,
            self.result.label(),
            show(&self.from_version),
            show(&self.to_version)
        )?;
        match &self.result {
            PromotionResult::Skipped { reason } => write!(f, " [{reason:?}]"),
            PromotionResult::Failed { cause, .. } => write!(f, " [{cause}]"),
            _ => Ok(()),
        }
    }
}

/// Native driver copied into an empty Active folder. Kept apart from
/// promotion records: nothing was archived and no candidate was consumed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedEvent {
    pub vendor: String,
    pub version: Option<Version>,
    pub source: PathBuf,
    pub destination: PathBuf,
    pub timestamp: DateTime<Utc>,
}

impl SeedEvent {
    pub fn new(vendor: &str, version: Option<Version>, source: PathBuf, destination: PathBuf) -> Self {
        Self {
            vendor: vendor.to_string(),
            version,
            source,
            destination,
            timestamp: Utc::now(),
        }
    }
}
