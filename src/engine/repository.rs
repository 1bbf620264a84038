//! Driver Repository
//!
//! Read-only view over the stage folders. Nothing is cached: every call
//! lists the directory again, since other processes may drop files into
//! New between runs.

use regex::Regex;
use serde::Serialize;
use std::sync::Arc;

use super::error::{DriverError, Result};
use super::fs::DriverFs;
use super::stage::{DriverFile, Stage, StageSet};
use super::version::Version;

pub const DEFAULT_FILE_PATTERN: &str = "{vendor}_Driver_v*.exe";

/// Filename template such as `{vendor}_Driver_v*.exe`.
///
/// `*` matches any run of characters and `?` a single one. The vendor
/// portion matches case-insensitively; the rest is literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePattern {
    template: String,
}

impl FilePattern {
    pub fn new(template: &str) -> Result<Self> {
        if !template.contains("{vendor}") {
            return Err(DriverError::ConfigurationMissing(format!(
                "file pattern {template:?} has no {{vendor}} placeholder"
            )));
        }
        if !template.contains('*') {
            return Err(DriverError::ConfigurationMissing(format!(
                "file pattern {template:?} has no * for the version"
            )));
        }
        Ok(Self {
            template: template.to_string(),
        })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Anchored regex matching this vendor's filenames
    pub fn for_vendor(&self, vendor: &str) -> Result<Regex> {
        let vendor_re = format!("(?i:{})", regex::escape(vendor));
        let body = self
            .template
            .split("{vendor}")
            .map(glob_to_regex)
            .collect::<Vec<_>>()
            .join(&vendor_re);

        Regex::new(&format!("^{body}$")).map_err(|e| {
            DriverError::ConfigurationMissing(format!("file pattern {:?}: {e}", self.template))
        })
    }
}

impl Default for FilePattern {
    fn default() -> Self {
        Self {
            template: DEFAULT_FILE_PATTERN.to_string(),
        }
    }
}

fn glob_to_regex(literal: &str) -> String {
    regex::escape(literal)
        .replace(r"\*", ".*")
        .replace(r"\?", ".")
}

/// One file as shown by the status view
#[derive(Debug, Clone, Serialize)]
pub struct StageEntry {
    pub file_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&DriverFile> for StageEntry {
    fn from(file: &DriverFile) -> Self {
        let (version, error) = match file.version() {
            Ok(v) => (Some(v), None),
            Err(e) => (None, Some(e.to_string())),
        };
        Self {
            file_name: file.file_name().to_string(),
            version,
            error,
        }
    }
}

/// Snapshot of one vendor across all four stages
#[derive(Debug, Clone, Serialize)]
pub struct VendorStatus {
    pub vendor: String,
    pub native: Option<StageEntry>,
    pub active: Option<StageEntry>,
    pub candidate: Option<StageEntry>,
    /// Oldest first; unparseable names last
    pub archived: Vec<StageEntry>,
}

pub struct DriverRepository {
    fs: Arc<dyn DriverFs>,
    stages: StageSet,
    pattern: FilePattern,
}

impl DriverRepository {
    pub fn new(fs: Arc<dyn DriverFs>, stages: StageSet, pattern: FilePattern) -> Self {
        Self { fs, stages, pattern }
    }

    pub fn stages(&self) -> &StageSet {
        &self.stages
    }

    /// Every file for `vendor` in `stage`, sorted by name
    pub fn list_drivers(&self, stage: Stage, vendor: &str) -> Result<Vec<DriverFile>> {
        let dir = self.stages.dir(stage);
        let pattern = self.pattern.for_vendor(vendor)?;
        let mut files: Vec<DriverFile> = self
            .fs
            .list_files(dir, &pattern)
            .map_err(|e| DriverError::filesystem("list", dir, e))?
            .into_iter()
            .map(|info| DriverFile::new(vendor, stage, info.path))
            .collect();

        files.sort_by(|a, b| a.file_name().cmp(b.file_name()));
        Ok(files)
    }

    /// The single driver for `vendor` in `stage`.
    ///
    /// Several matches resolve to the lexicographically greatest name. The
    /// promotion decision still parses the chosen file's real version.
    pub fn find_driver(&self, stage: Stage, vendor: &str) -> Result<Option<DriverFile>> {
        let files = self.list_drivers(stage, vendor)?;
        if files.len() > 1 {
            tracing::debug!(
                vendor,
                stage = %stage,
                count = files.len(),
                "multiple drivers matched, taking greatest name"
            );
        }
        Ok(files.into_iter().last())
    }

    pub fn vendor_status(&self, vendor: &str) -> Result<VendorStatus> {
        let entry = |stage: Stage| -> Result<Option<StageEntry>> {
            Ok(self.find_driver(stage, vendor)?.as_ref().map(StageEntry::from))
        };

        let mut archived: Vec<StageEntry> = self
            .list_drivers(Stage::Archive, vendor)?
            .iter()
            .map(StageEntry::from)
            .collect();
        archived.sort_by(|a, b| match (&a.version, &b.version) {
            (Some(x), Some(y)) => x.cmp(y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.file_name.cmp(&b.file_name),
        });

        Ok(VendorStatus {
            vendor: vendor.to_string(),
            native: entry(Stage::Native)?,
            active: entry(Stage::Active)?,
            candidate: entry(Stage::New)?,
            archived,
        })
    }
}
