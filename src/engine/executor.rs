//! Promotion Executor
//!
//! Two ordered moves: the current driver goes Active -> Archive, then the
//! candidate goes New -> Active. Archive is the only recovery point, so the
//! second move never starts before the first has finished.

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::error::{DriverError, Result};
use super::fs::DriverFs;
use super::record::PromotionRecord;
use super::rescan::Rescanner;
use super::stage::{DriverFile, Stage, StageSet};

pub struct PromotionExecutor {
    fs: Arc<dyn DriverFs>,
    stages: StageSet,
    rescanner: Arc<dyn Rescanner>,
}

impl PromotionExecutor {
    pub fn new(fs: Arc<dyn DriverFs>, stages: StageSet, rescanner: Arc<dyn Rescanner>) -> Self {
        Self {
            fs,
            stages,
            rescanner,
        }
    }

    /// Replace `current` with `candidate`.
    ///
    /// If the candidate move fails after the archive move succeeded, Active is
    /// left empty and the record points at the archived file. No automatic
    /// reversal is attempted.
    pub fn promote(
        &self,
        vendor: &str,
        current: Option<&DriverFile>,
        candidate: &DriverFile,
    ) -> PromotionRecord {
        let from = current.and_then(|file| file.version().ok());
        let to = match candidate.version() {
            Ok(version) => version,
            Err(e) => return PromotionRecord::failed(vendor, from, None, &e, None),
        };

        let archived = match current {
            Some(file) => match self.archive(file) {
                Ok(archived) => archived,
                Err(e) => {
                    error!(vendor, error = %e, "archiving current driver failed, nothing changed");
                    return PromotionRecord::failed(vendor, from, Some(to), &e, None);
                }
            },
            None => None,
        };

        let target = candidate.relocated(&self.stages, Stage::Active);
        if let Err(e) = self.fs.move_file(&candidate.path, &target.path) {
            let err = DriverError::filesystem("activate", &candidate.path, e);
            error!(
                vendor,
                error = %err,
                archived = ?archived,
                "candidate not activated; Active is empty, previous driver kept in Archive"
            );
            return PromotionRecord::failed(vendor, from, Some(to), &err, archived);
        }

        let digest = match self.fs.digest(&target.path) {
            Ok(digest) => Some(digest),
            Err(e) => {
                warn!(vendor, error = %e, "could not digest activated driver");
                None
            }
        };

        info!(
            vendor,
            from = ?from.as_ref().map(ToString::to_string),
            to = %to,
            "driver promoted"
        );
        self.rescanner.notify_driver_installed(vendor);

        PromotionRecord::promoted(vendor, from, to, digest)
    }

    /// Move `file` into Archive, returning where it now lives.
    ///
    /// `Ok(None)` means the file was already gone and nothing is archived.
    fn archive(&self, file: &DriverFile) -> Result<Option<PathBuf>> {
        let target = self.stages.path_in(Stage::Archive, file.file_name());

        if !self.fs.exists(&file.path) {
            if self.fs.exists(&target) {
                return Ok(Some(target));
            }
            warn!(vendor = %file.vendor, path = %file.path.display(), "current driver vanished before archiving");
            return Ok(None);
        }

        if self.fs.exists(&target) {
            // Same name already archived, e.g. a Native seed of a version that
            // was superseded before. Identical bytes mean it is safe to drop.
            let current = self
                .fs
                .digest(&file.path)
                .map_err(|e| DriverError::filesystem("digest", &file.path, e))?;
            let existing = self
                .fs
                .digest(&target)
                .map_err(|e| DriverError::filesystem("digest", &target, e))?;
            if current != existing {
                return Err(DriverError::ArchiveConflict { path: target });
            }
            self.fs
                .remove_file(&file.path)
                .map_err(|e| DriverError::filesystem("remove", &file.path, e))?;
            return Ok(Some(target));
        }

        self.fs
            .move_file(&file.path, &target)
            .map_err(|e| DriverError::filesystem("archive", &file.path, e))?;
        Ok(Some(target))
    }
}
