//! Stage Layout
//!
//! The four lifecycle folders and the driver files found in them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use super::error::Result;
use super::version::{self, Version};

/// Lifecycle stage of a driver file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Factory baseline, never modified
    Native,
    /// Driver currently in use
    Active,
    /// Inbound candidates
    New,
    /// Superseded drivers kept for recovery
    Archive,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Native, Stage::Active, Stage::New, Stage::Archive];

    pub fn label(&self) -> &'static str {
        match self {
            Stage::Native => "Native",
            Stage::Active => "Active",
            Stage::New => "New",
            Stage::Archive => "Archive",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Resolved directories for the four stages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSet {
    pub native: PathBuf,
    pub active: PathBuf,
    pub new: PathBuf,
    pub archive: PathBuf,
}

impl StageSet {
    /// Stage folders directly under `base` with their default names
    pub fn under(base: &Path) -> Self {
        Self {
            native: base.join(Stage::Native.label()),
            active: base.join(Stage::Active.label()),
            new: base.join(Stage::New.label()),
            archive: base.join(Stage::Archive.label()),
        }
    }

    pub fn dir(&self, stage: Stage) -> &Path {
        match stage {
            Stage::Native => &self.native,
            Stage::Active => &self.active,
            Stage::New => &self.new,
            Stage::Archive => &self.archive,
        }
    }

    /// Where a file of the given name lands in `stage`
    pub fn path_in(&self, stage: Stage, file_name: &str) -> PathBuf {
        self.dir(stage).join(file_name)
    }
}

/// A driver binary found by a directory scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverFile {
    pub vendor: String,
    pub stage: Stage,
    pub path: PathBuf,
    /// Raw `v<...>` text from the filename, unparsed
    pub version_token: Option<String>,
}

impl DriverFile {
    pub fn new(vendor: &str, stage: Stage, path: PathBuf) -> Self {
        let version_token = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(version::extract_token)
            .map(String::from);

        Self {
            vendor: vendor.to_string(),
            stage,
            path,
            version_token,
        }
    }

    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }

    pub fn version(&self) -> Result<Version> {
        Version::from_file_name(self.file_name())
    }

    /// Same file name relocated to another stage
    pub fn relocated(&self, stages: &StageSet, stage: Stage) -> DriverFile {
        DriverFile {
            vendor: self.vendor.clone(),
            stage,
            path: stages.path_in(stage, self.file_name()),
            version_token: self.version_token.clone(),
        }
    }
}
