//! Archive Restore
//!
//! Operator recovery after a promotion left Active empty: the newest
//! archived driver moves back into Active.

use std::sync::Arc;
use thiserror::Error;

use super::config::RunSettings;
use super::error::DriverError;
use super::fs::DriverFs;
use super::record::SeedEvent;
use super::repository::DriverRepository;
use super::rescan::Rescanner;
use super::stage::{DriverFile, Stage};
use super::version::Version;

#[derive(Error, Debug)]
pub enum RestoreError {
    #[error("{vendor} still has an Active driver ({file}); restore only fills an empty Active folder")]
    ActivePresent { vendor: String, file: String },
    #[error("Archive holds no versioned driver for {0}")]
    NothingArchived(String),
    #[error(transparent)]
    Driver(#[from] DriverError),
}

pub struct ArchiveRestorer {
    fs: Arc<dyn DriverFs>,
    repository: DriverRepository,
    rescanner: Arc<dyn Rescanner>,
}

impl ArchiveRestorer {
    pub fn new(settings: &RunSettings, fs: Arc<dyn DriverFs>, rescanner: Arc<dyn Rescanner>) -> Self {
        let repository =
            DriverRepository::new(Arc::clone(&fs), settings.stages.clone(), settings.pattern.clone());
        Self {
            fs,
            repository,
            rescanner,
        }
    }

    /// Highest archived version for `vendor`, ignoring names that do not parse
    pub fn latest_archived(&self, vendor: &str) -> Result<Option<(DriverFile, Version)>, DriverError> {
        let mut best: Option<(DriverFile, Version)> = None;
        for file in self.repository.list_drivers(Stage::Archive, vendor)? {
            let version = match file.version() {
                Ok(version) => version,
                Err(e) => {
                    tracing::warn!(vendor, error = %e, "skipping unversioned archive entry");
                    continue;
                }
            };
            if best.as_ref().map_or(true, |(_, current)| version > *current) {
                best = Some((file, version));
            }
        }
        Ok(best)
    }

    pub fn restore(&self, vendor: &str) -> Result<SeedEvent, RestoreError> {
        if let Some(active) = self.repository.find_driver(Stage::Active, vendor)? {
            return Err(RestoreError::ActivePresent {
                vendor: vendor.to_string(),
                file: active.file_name().to_string(),
            });
        }

        let (archived, version) = self
            .latest_archived(vendor)?
            .ok_or_else(|| RestoreError::NothingArchived(vendor.to_string()))?;

        let target = archived.relocated(self.repository.stages(), Stage::Active);
        self.fs
            .move_file(&archived.path, &target.path)
            .map_err(|e| DriverError::filesystem("restore", &archived.path, e))?;

        tracing::info!(vendor, version = %version, "restored archived driver to Active");
        self.rescanner.notify_driver_installed(vendor);

        Ok(SeedEvent::new(vendor, Some(version), archived.path, target.path))
    }
}
