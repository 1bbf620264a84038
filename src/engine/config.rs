//! DriverStage Configuration Module
//! Handles loading and validating driverstage.config.json

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::repository::{FilePattern, DEFAULT_FILE_PATTERN};
use super::stage::{Stage, StageSet};

pub const CONFIG_FILE: &str = "driverstage.config.json";
pub const JOURNAL_FILE: &str = "driverstage.journal.jsonl";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
    #[error("Failed to read config: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Invalid config format: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Configuration missing: {0}")]
    Missing(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageNames {
    #[serde(default = "default_native")]
    pub native: String,
    #[serde(default = "default_active")]
    pub active: String,
    #[serde(default = "default_new")]
    pub new: String,
    #[serde(default = "default_archive")]
    pub archive: String,
}

impl Default for StageNames {
    fn default() -> Self {
        Self {
            native: default_native(),
            active: default_active(),
            new: default_new(),
            archive: default_archive(),
        }
    }
}

impl StageNames {
    fn name(&self, stage: Stage) -> &str {
        match stage {
            Stage::Native => &self.native,
            Stage::Active => &self.active,
            Stage::New => &self.new,
            Stage::Archive => &self.archive,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Folder holding the four stages; relative paths resolve against the
    /// config file's directory
    #[serde(default)]
    pub base_path: Option<PathBuf>,
    #[serde(default)]
    pub stages: StageNames,
    #[serde(default)]
    pub vendors: Vec<String>,
    #[serde(default = "default_pattern")]
    pub file_pattern: String,
    #[serde(default)]
    pub auto_approve: bool,
    /// argv of the device rescan command; an empty list disables rescans
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rescan_command: Option<Vec<String>>,
    #[serde(default = "default_true")]
    pub parallel: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal: Option<PathBuf>,

    #[serde(skip)]
    source_dir: Option<PathBuf>,
}

fn default_native() -> String {
    Stage::Native.label().to_string()
}

fn default_active() -> String {
    Stage::Active.label().to_string()
}

fn default_new() -> String {
    Stage::New.label().to_string()
}

fn default_archive() -> String {
    Stage::Archive.label().to_string()
}

fn default_pattern() -> String {
    DEFAULT_FILE_PATTERN.to_string()
}

fn default_true() -> bool {
    true
}

/// Everything a run needs, resolved once at startup
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub base_path: PathBuf,
    pub stages: StageSet,
    pub vendors: Vec<String>,
    pub pattern: FilePattern,
    pub auto_approve: bool,
    pub parallel: bool,
    /// `None` means use the platform default
    pub rescan_command: Option<Vec<String>>,
    pub journal_path: PathBuf,
}

impl RunSettings {
    /// The base folder must exist before anything runs against it
    pub fn ensure_base_exists(&self) -> Result<(), ConfigError> {
        if !self.base_path.is_dir() {
            return Err(ConfigError::Missing(format!(
                "base path {} does not exist (run `driverstage init`)",
                self.base_path.display()
            )));
        }
        Ok(())
    }

    /// Narrow the vendor list to `requested`, matched case-insensitively.
    /// An empty request keeps every vendor.
    pub fn select_vendors(&mut self, requested: &[String]) -> Result<(), ConfigError> {
        if requested.is_empty() {
            return Ok(());
        }
        let mut selected = Vec::new();
        for name in requested {
            let vendor = self
                .vendors
                .iter()
                .find(|v| v.eq_ignore_ascii_case(name.trim()))
                .ok_or_else(|| ConfigError::Missing(format!("vendor {name:?} is not configured")))?;
            if !selected.contains(vendor) {
                selected.push(vendor.clone());
            }
        }
        self.vendors = selected;
        Ok(())
    }
}

impl Config {
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        Self::load_file(&dir.join(CONFIG_FILE))
    }

    pub fn load_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::NotFound(config_path.to_path_buf()));
        }
        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = serde_json::from_str(&content)?;
        config.source_dir = config_path.parent().map(Path::to_path_buf);
        Ok(config)
    }

    /// Find the config file: an explicit file or directory, then the current
    /// directory, then the user config directory
    pub fn locate(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
        if let Some(path) = explicit {
            let path = if path.is_dir() { path.join(CONFIG_FILE) } else { path.to_path_buf() };
            return if path.exists() { Ok(path) } else { Err(ConfigError::NotFound(path)) };
        }

        let local = std::env::current_dir()?.join(CONFIG_FILE);
        if local.exists() {
            return Ok(local);
        }

        let user = dirs::config_dir()
            .map(|d| d.join("driverstage").join(CONFIG_FILE))
            .ok_or_else(|| ConfigError::NotFound(local.clone()))?;
        if user.exists() {
            Ok(user)
        } else {
            Err(ConfigError::NotFound(local))
        }
    }

    pub fn save(&self, dir: &Path) -> Result<PathBuf, ConfigError> {
        let config_path = dir.join(CONFIG_FILE);
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(config_path)
    }

    pub fn default_template(base_path: &Path) -> Self {
        Self {
            base_path: Some(base_path.to_path_buf()),
            stages: StageNames::default(),
            vendors: vec!["NVIDIA".to_string(), "AMD".to_string(), "Intel".to_string()],
            file_pattern: default_pattern(),
            auto_approve: false,
            rescan_command: None,
            parallel: true,
            journal: None,
            source_dir: None,
        }
    }

    /// Validate and turn into absolute paths
    pub fn resolve(&self) -> Result<RunSettings, ConfigError> {
        let base = self
            .base_path
            .as_ref()
            .ok_or_else(|| ConfigError::Missing("base_path".to_string()))?;
        let base_path = match (&self.source_dir, base.is_relative()) {
            (Some(dir), true) => dir.join(base),
            _ => base.clone(),
        };
        // A relative config path leaves source_dir relative too; anchor it
        // to the working directory so recorded paths stay usable elsewhere.
        let base_path = std::path::absolute(&base_path)?;

        let mut seen = HashSet::new();
        for stage in Stage::ALL {
            let name = self.stages.name(stage).trim();
            if name.is_empty() {
                return Err(ConfigError::Missing(format!("stage folder name for {stage}")));
            }
            if !seen.insert(name.to_string()) {
                return Err(ConfigError::Missing(format!("stage folder {name:?} is used twice")));
            }
        }
        let stages = StageSet {
            native: base_path.join(self.stages.native.trim()),
            active: base_path.join(self.stages.active.trim()),
            new: base_path.join(self.stages.new.trim()),
            archive: base_path.join(self.stages.archive.trim()),
        };

        let vendors: Vec<String> = self.vendors.iter().map(|v| v.trim().to_string()).collect();
        if vendors.is_empty() {
            return Err(ConfigError::Missing("vendors".to_string()));
        }
        let mut seen = HashSet::new();
        for vendor in &vendors {
            if vendor.is_empty() {
                return Err(ConfigError::Missing("empty vendor name".to_string()));
            }
            // Matching is case-insensitive, so these would share files
            if !seen.insert(vendor.to_lowercase()) {
                return Err(ConfigError::Missing(format!("vendor {vendor:?} is listed twice")));
            }
        }

        let pattern =
            FilePattern::new(&self.file_pattern).map_err(|e| ConfigError::Missing(e.to_string()))?;

        let journal_path = match &self.journal {
            Some(path) if path.is_relative() => base_path.join(path),
            Some(path) => path.clone(),
            None => base_path.join(JOURNAL_FILE),
        };

        Ok(RunSettings {
            base_path,
            stages,
            vendors,
            pattern,
            auto_approve: self.auto_approve,
            parallel: self.parallel,
            rescan_command: self.rescan_command.clone(),
            journal_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"base_path": "/drivers", "vendors": ["NVIDIA"]}"#).unwrap();
        let settings = config.resolve().unwrap();

        assert_eq!(settings.stages, StageSet::under(Path::new("/drivers")));
        assert_eq!(settings.pattern.template(), DEFAULT_FILE_PATTERN);
        assert!(settings.parallel);
        assert!(!settings.auto_approve);
        assert_eq!(settings.journal_path, PathBuf::from("/drivers").join(JOURNAL_FILE));
    }

    #[test]
    fn test_missing_base_path_is_fatal() {
        let config: Config = serde_json::from_str(r#"{"vendors": ["NVIDIA"]}"#).unwrap();
        assert!(matches!(config.resolve(), Err(ConfigError::Missing(_))));
    }

    #[test]
    fn test_invalid_stage_names() {
        let config: Config = serde_json::from_str(
            r#"{"base_path": "/d", "vendors": ["AMD"], "stages": {"native": "", "active": "A", "new": "N", "archive": "R"}}"#,
        )
        .unwrap();
        assert!(config.resolve().is_err());

        let config: Config = serde_json::from_str(
            r#"{"base_path": "/d", "vendors": ["AMD"], "stages": {"new": "Active"}}"#,
        )
        .unwrap();
        assert!(config.resolve().is_err());
    }

    #[test]
    fn test_vendor_validation() {
        let empty: Config = serde_json::from_str(r#"{"base_path": "/d"}"#).unwrap();
        assert!(empty.resolve().is_err());

        let dup: Config =
            serde_json::from_str(r#"{"base_path": "/d", "vendors": ["AMD", "amd"]}"#).unwrap();
        assert!(dup.resolve().is_err());
    }

    #[test]
    fn test_bad_pattern_rejected() {
        let config: Config = serde_json::from_str(
            r#"{"base_path": "/d", "vendors": ["AMD"], "file_pattern": "Driver_v*.exe"}"#,
        )
        .unwrap();
        assert!(matches!(config.resolve(), Err(ConfigError::Missing(_))));
    }

    #[test]
    fn test_save_load_resolves_relative_base() {
        let dir = tempdir().unwrap();
        let mut config = Config::default_template(Path::new("drivers"));
        config.rescan_command = Some(vec![]);
        config.save(dir.path()).unwrap();

        let loaded = Config::load(dir.path()).unwrap();
        let settings = loaded.resolve().unwrap();
        assert_eq!(settings.base_path, dir.path().join("drivers"));
        assert_eq!(settings.vendors, vec!["NVIDIA", "AMD", "Intel"]);
        assert_eq!(settings.rescan_command, Some(vec![]));
        assert!(settings.ensure_base_exists().is_err());
    }

    #[test]
    fn test_select_vendors() {
        let config: Config =
            serde_json::from_str(r#"{"base_path": "/d", "vendors": ["NVIDIA", "AMD", "Intel"]}"#).unwrap();
        let mut settings = config.resolve().unwrap();

        settings.select_vendors(&["intel".to_string(), "NVIDIA".to_string()]).unwrap();
        assert_eq!(settings.vendors, vec!["Intel", "NVIDIA"]);
        assert!(settings.select_vendors(&["Matrox".to_string()]).is_err());
    }

    #[test]
    fn test_load_not_found() {
        let dir = tempdir().unwrap();
        assert!(matches!(Config::load(dir.path()), Err(ConfigError::NotFound(_))));
        assert!(matches!(
            Config::locate(Some(&dir.path().join("missing.json"))),
            Err(ConfigError::NotFound(_))
        ));
    }

    #[test]
    fn test_relative_config_path_resolves_absolute() {
        let cwd = std::env::current_dir().unwrap();

        // What load_file("driverstage.config.json") leaves behind
        let mut config: Config =
            serde_json::from_str(r#"{"base_path": "drivers", "vendors": ["AMD"]}"#).unwrap();
        config.source_dir = Some(PathBuf::new());
        let settings = config.resolve().unwrap();
        assert!(settings.base_path.is_absolute());
        assert!(settings.stages.active.is_absolute());
        assert_eq!(settings.stages.active, cwd.join("drivers").join("Active"));
        assert!(settings.journal_path.is_absolute());

        config.source_dir = None;
        let settings = config.resolve().unwrap();
        assert_eq!(settings.base_path, cwd.join("drivers"));
    }
}
