//! Update Orchestrator
//!
//! Runs each vendor through ResolveCurrent -> ResolveCandidate -> Decide ->
//! Promote | Skip | Decline. Steps within a vendor are sequential; vendors
//! run in parallel and never affect one another's outcome.

use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::approval::Approver;
use super::config::RunSettings;
use super::error::{DriverError, Result};
use super::executor::PromotionExecutor;
use super::fs::DriverFs;
use super::policy;
use super::record::{PromotionRecord, SeedEvent, SkipReason};
use super::repository::DriverRepository;
use super::rescan::Rescanner;
use super::stage::{DriverFile, Stage};

/// Everything one vendor run produced
#[derive(Debug, Clone, Serialize)]
pub struct VendorRun {
    pub record: PromotionRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<SeedEvent>,
}

pub struct UpdateOrchestrator {
    vendors: Vec<String>,
    parallel: bool,
    fs: Arc<dyn DriverFs>,
    repository: DriverRepository,
    executor: PromotionExecutor,
    approver: Arc<dyn Approver>,
}

impl UpdateOrchestrator {
    pub fn new(
        settings: &RunSettings,
        fs: Arc<dyn DriverFs>,
        approver: Arc<dyn Approver>,
        rescanner: Arc<dyn Rescanner>,
    ) -> Self {
        let repository =
            DriverRepository::new(Arc::clone(&fs), settings.stages.clone(), settings.pattern.clone());
        let executor = PromotionExecutor::new(Arc::clone(&fs), settings.stages.clone(), rescanner);

        Self {
            vendors: settings.vendors.clone(),
            parallel: settings.parallel,
            fs,
            repository,
            executor,
            approver,
        }
    }

    pub fn vendors(&self) -> &[String] {
        &self.vendors
    }

    pub fn repository(&self) -> &DriverRepository {
        &self.repository
    }

    /// Run every configured vendor, results in configured order
    pub async fn run_all(self: Arc<Self>) -> Vec<VendorRun> {
        if !self.parallel {
            return self.vendors.iter().map(|vendor| self.run_vendor(vendor)).collect();
        }

        let mut workers = JoinSet::new();
        for (index, vendor) in self.vendors.iter().cloned().enumerate() {
            let orchestrator = Arc::clone(&self);
            workers.spawn_blocking(move || (index, orchestrator.run_vendor(&vendor)));
        }

        let mut slots: Vec<Option<VendorRun>> = (0..self.vendors.len()).map(|_| None).collect();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((index, run)) => slots[index] = Some(run),
                Err(e) => error!(error = %e, "vendor worker died"),
            }
        }

        slots
            .into_iter()
            .zip(&self.vendors)
            .map(|(slot, vendor)| {
                slot.unwrap_or_else(|| VendorRun {
                    record: PromotionRecord::failed_internal(vendor, "worker stopped before reporting"),
                    seed: None,
                })
            })
            .collect()
    }

    /// One vendor, start to finish. Never returns an error: every failure
    /// becomes a `Failed` record.
    pub fn run_vendor(&self, vendor: &str) -> VendorRun {
        let span = tracing::info_span!("vendor", vendor = %vendor);
        let _entered = span.enter();

        let mut seed = None;
        let record = match self.drive(vendor, &mut seed) {
            Ok(record) => record,
            Err(e) => {
                error!(error = %e, "vendor run failed");
                PromotionRecord::failed(vendor, None, None, &e, None)
            }
        };
        VendorRun { record, seed }
    }

    fn drive(&self, vendor: &str, seed: &mut Option<SeedEvent>) -> Result<PromotionRecord> {
        let current = self.resolve_current(vendor, seed)?;

        let Some(candidate) = self.repository.find_driver(Stage::New, vendor)? else {
            info!("no candidate in New, skipping");
            let from = current.as_ref().and_then(|f| f.version().ok());
            return Ok(PromotionRecord::skipped(vendor, from, None, SkipReason::NoCandidate));
        };

        let current_version = match current.as_ref().map(DriverFile::version).transpose() {
            Ok(version) => version,
            Err(e) => {
                warn!(error = %e, "current driver has no usable version, refusing to compare");
                return Ok(PromotionRecord::failed(vendor, None, None, &e, None));
            }
        };
        let candidate_version = match candidate.version() {
            Ok(version) => version,
            Err(e) => {
                warn!(error = %e, "candidate has no usable version, refusing to promote");
                return Ok(PromotionRecord::failed(vendor, current_version, None, &e, None));
            }
        };

        if !policy::should_promote(current_version.as_ref(), &candidate_version) {
            info!(candidate = %candidate_version, "candidate is not newer, skipping");
            return Ok(PromotionRecord::skipped(
                vendor,
                current_version,
                Some(candidate_version),
                SkipReason::NotNewer,
            ));
        }

        let prompt = match &current_version {
            Some(from) => format!("Promote {vendor} driver {from} -> {candidate_version}?"),
            None => format!("Install {vendor} driver {candidate_version}?"),
        };
        if !self.approver.confirm(&prompt) {
            info!(candidate = %candidate_version, "promotion declined");
            return Ok(PromotionRecord::declined(vendor, current_version, candidate_version));
        }

        Ok(self.executor.promote(vendor, current.as_ref(), &candidate))
    }

    /// Active driver, or a copy of the Native one seeded into Active.
    ///
    /// A failed seed copy is an error: promoting against an unknown current
    /// state is not allowed.
    fn resolve_current(&self, vendor: &str, seed: &mut Option<SeedEvent>) -> Result<Option<DriverFile>> {
        if let Some(active) = self.repository.find_driver(Stage::Active, vendor)? {
            debug!(file = active.file_name(), "current driver found in Active");
            return Ok(Some(active));
        }

        let Some(native) = self.repository.find_driver(Stage::Native, vendor)? else {
            debug!("no Active or Native driver");
            return Ok(None);
        };

        let seeded = native.relocated(self.repository.stages(), Stage::Active);
        self.fs
            .copy_file(&native.path, &seeded.path)
            .map_err(|e| DriverError::filesystem("seed", &native.path, e))?;

        info!(file = native.file_name(), "seeded Active from Native");
        *seed = Some(SeedEvent::new(
            vendor,
            native.version().ok(),
            native.path.clone(),
            seeded.path.clone(),
        ));
        Ok(Some(seeded))
    }
}
