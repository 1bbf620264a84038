use driverstage_lib::engine::approval::PolicyApprover;
use driverstage_lib::engine::config::RunSettings;
use driverstage_lib::engine::fs::{DriverFs, FileInfo, LocalFs};
use driverstage_lib::engine::journal::{Journal, JournalEvent};
use driverstage_lib::engine::orchestrator::UpdateOrchestrator;
use driverstage_lib::engine::record::{FailureKind, PromotionResult, SkipReason};
use driverstage_lib::engine::repository::FilePattern;
use driverstage_lib::engine::rescan::Rescanner;
use driverstage_lib::engine::restore::ArchiveRestorer;
use driverstage_lib::engine::stage::{Stage, StageSet};
use regex::Regex;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Local filesystem that can be told to fail specific operations
#[derive(Default)]
struct FaultyFs {
    fail_moves_into: Option<PathBuf>,
    fail_copies: bool,
}

impl DriverFs for FaultyFs {
    fn list_files(&self, dir: &Path, pattern: &Regex) -> io::Result<Vec<FileInfo>> {
        LocalFs.list_files(dir, pattern)
    }

    fn move_file(&self, src: &Path, dst: &Path) -> io::Result<()> {
        if let Some(dir) = &self.fail_moves_into {
            if dst.parent() == Some(dir.as_path()) {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "injected move failure"));
            }
        }
        LocalFs.move_file(src, dst)
    }

    fn copy_file(&self, src: &Path, dst: &Path) -> io::Result<()> {
        if self.fail_copies {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "injected copy failure"));
        }
        LocalFs.copy_file(src, dst)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        LocalFs.remove_file(path)
    }

    fn exists(&self, path: &Path) -> bool {
        LocalFs.exists(path)
    }

    fn digest(&self, path: &Path) -> io::Result<String> {
        LocalFs.digest(path)
    }
}

#[derive(Default)]
struct CountingRescanner {
    calls: AtomicUsize,
}

impl Rescanner for CountingRescanner {
    fn notify_driver_installed(&self, _vendor: &str) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

struct Fixture {
    _root: tempfile::TempDir,
    settings: RunSettings,
}

impl Fixture {
    fn new(vendors: &[&str]) -> Self {
        let root = tempfile::tempdir().unwrap();
        let base = root.path().join("drivers");
        let stages = StageSet::under(&base);
        for stage in Stage::ALL {
            fs::create_dir_all(stages.dir(stage)).unwrap();
        }
        let settings = RunSettings {
            base_path: base.clone(),
            stages,
            vendors: vendors.iter().map(|v| v.to_string()).collect(),
            pattern: FilePattern::default(),
            auto_approve: false,
            parallel: true,
            rescan_command: None,
            journal_path: base.join("journal.jsonl"),
        };
        Self { _root: root, settings }
    }

    fn put(&self, stage: Stage, name: &str, body: &[u8]) {
        fs::write(self.settings.stages.path_in(stage, name), body).unwrap();
    }

    fn read(&self, stage: Stage, name: &str) -> Option<Vec<u8>> {
        fs::read(self.settings.stages.path_in(stage, name)).ok()
    }

    fn names(&self, stage: Stage) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.settings.stages.dir(stage))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn orchestrator(
        &self,
        fs: Arc<dyn DriverFs>,
        approve: bool,
        rescanner: Arc<dyn Rescanner>,
    ) -> UpdateOrchestrator {
        UpdateOrchestrator::new(&self.settings, fs, Arc::new(PolicyApprover::new(approve)), rescanner)
    }

    fn local(&self, approve: bool) -> UpdateOrchestrator {
        self.orchestrator(Arc::new(LocalFs), approve, Arc::new(CountingRescanner::default()))
    }
}

#[test]
fn test_scenario_a_newer_candidate_is_promoted() {
    let fx = Fixture::new(&["NVIDIA"]);
    fx.put(Stage::Active, "NVIDIA_Driver_v1.0.exe", b"driver one");
    fx.put(Stage::New, "NVIDIA_Driver_v2.0.exe", b"driver two");
    let rescanner = Arc::new(CountingRescanner::default());

    let run = fx
        .orchestrator(Arc::new(LocalFs), true, rescanner.clone())
        .run_vendor("NVIDIA");

    assert_eq!(run.record.result, PromotionResult::Promoted);
    assert_eq!(run.record.from_version.as_ref().unwrap().to_string(), "1.0");
    assert_eq!(run.record.to_version.as_ref().unwrap().to_string(), "2.0");

    // Contents survive both moves unchanged
    assert_eq!(fx.read(Stage::Archive, "NVIDIA_Driver_v1.0.exe").unwrap(), b"driver one");
    assert_eq!(fx.read(Stage::Active, "NVIDIA_Driver_v2.0.exe").unwrap(), b"driver two");
    assert_eq!(fx.names(Stage::Active), vec!["NVIDIA_Driver_v2.0.exe"]);
    assert!(fx.names(Stage::New).is_empty());

    let active = fx.settings.stages.path_in(Stage::Active, "NVIDIA_Driver_v2.0.exe");
    assert_eq!(run.record.digest, Some(LocalFs.digest(&active).unwrap()));
    assert_eq!(rescanner.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_scenario_b_native_seeds_active_without_candidate() {
    let fx = Fixture::new(&["AMD"]);
    fx.put(Stage::Native, "AMD_Driver_v1.0.exe", b"factory");

    let run = fx.local(true).run_vendor("AMD");

    assert_eq!(run.record.result, PromotionResult::Skipped { reason: SkipReason::NoCandidate });
    assert_eq!(run.record.from_version.as_ref().unwrap().to_string(), "1.0");
    let seed = run.seed.expect("seed event");
    assert_eq!(seed.version.unwrap().to_string(), "1.0");

    assert_eq!(fx.read(Stage::Active, "AMD_Driver_v1.0.exe").unwrap(), b"factory");
    assert_eq!(fx.read(Stage::Native, "AMD_Driver_v1.0.exe").unwrap(), b"factory");
}

#[test]
fn test_scenario_c_older_candidate_is_skipped() {
    let fx = Fixture::new(&["Intel"]);
    fx.put(Stage::Active, "Intel_Driver_v3.1.exe", b"current");
    fx.put(Stage::New, "Intel_Driver_v2.9.exe", b"older");

    let run = fx.local(true).run_vendor("Intel");

    assert_eq!(run.record.result, PromotionResult::Skipped { reason: SkipReason::NotNewer });
    assert_eq!(fx.names(Stage::Active), vec!["Intel_Driver_v3.1.exe"]);
    assert_eq!(fx.names(Stage::New), vec!["Intel_Driver_v2.9.exe"]);
    assert!(fx.names(Stage::Archive).is_empty());
}

#[test]
fn test_scenario_d_unversioned_candidate_fails() {
    let fx = Fixture::new(&["NVIDIA"]);
    fx.put(Stage::Active, "NVIDIA_Driver_v1.0.exe", b"current");
    fx.put(Stage::New, "NVIDIA_Driver_vX.exe", b"mystery");

    let run = fx.local(true).run_vendor("NVIDIA");

    match &run.record.result {
        PromotionResult::Failed { kind, .. } => assert_eq!(*kind, FailureKind::InvalidVersion),
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(fx.names(Stage::Active), vec!["NVIDIA_Driver_v1.0.exe"]);
    assert!(fx.names(Stage::Archive).is_empty());
    assert_eq!(fx.names(Stage::New), vec!["NVIDIA_Driver_vX.exe"]);
}

#[test]
fn test_scenario_e_declined_changes_nothing() {
    let fx = Fixture::new(&["NVIDIA"]);
    fx.put(Stage::Active, "NVIDIA_Driver_v1.0.exe", b"current");
    fx.put(Stage::New, "NVIDIA_Driver_v2.0.exe", b"candidate");

    let run = fx.local(false).run_vendor("NVIDIA");

    assert_eq!(run.record.result, PromotionResult::Declined);
    assert_eq!(fx.names(Stage::Active), vec!["NVIDIA_Driver_v1.0.exe"]);
    assert_eq!(fx.names(Stage::New), vec!["NVIDIA_Driver_v2.0.exe"]);
    assert!(fx.names(Stage::Archive).is_empty());
}

#[test]
fn test_second_run_never_re_archives() {
    let fx = Fixture::new(&["NVIDIA"]);
    fx.put(Stage::Active, "NVIDIA_Driver_v1.0.exe", b"one");
    fx.put(Stage::New, "NVIDIA_Driver_v2.0.exe", b"two");
    let orchestrator = fx.local(true);

    assert_eq!(orchestrator.run_vendor("NVIDIA").record.result, PromotionResult::Promoted);

    // Same candidate dropped in again
    fx.put(Stage::New, "NVIDIA_Driver_v2.0.exe", b"two");
    let again = orchestrator.run_vendor("NVIDIA");
    assert_eq!(again.record.result, PromotionResult::Skipped { reason: SkipReason::NotNewer });
    assert_eq!(fx.names(Stage::Archive), vec!["NVIDIA_Driver_v1.0.exe"]);
}

#[test]
fn test_failed_activation_leaves_archive_as_recovery_point() {
    let fx = Fixture::new(&["NVIDIA"]);
    fx.put(Stage::Active, "NVIDIA_Driver_v1.0.exe", b"one");
    fx.put(Stage::New, "NVIDIA_Driver_v2.0.exe", b"two");
    let faulty = FaultyFs {
        fail_moves_into: Some(fx.settings.stages.active.clone()),
        ..FaultyFs::default()
    };
    let rescanner = Arc::new(CountingRescanner::default());

    let run = fx
        .orchestrator(Arc::new(faulty), true, rescanner.clone())
        .run_vendor("NVIDIA");

    let archived_path = fx.settings.stages.path_in(Stage::Archive, "NVIDIA_Driver_v1.0.exe");
    match &run.record.result {
        PromotionResult::Failed { kind, archived, cause } => {
            assert_eq!(*kind, FailureKind::Filesystem);
            assert_eq!(archived.as_deref(), Some(archived_path.as_path()));
            assert!(cause.contains("injected move failure"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(run.record.from_version.as_ref().unwrap().to_string(), "1.0");
    assert!(fx.names(Stage::Active).is_empty());
    assert_eq!(fx.read(Stage::Archive, "NVIDIA_Driver_v1.0.exe").unwrap(), b"one");
    assert_eq!(fx.names(Stage::New), vec!["NVIDIA_Driver_v2.0.exe"]);
    assert_eq!(rescanner.calls.load(Ordering::SeqCst), 0);

    // Operator recovery brings the archived driver back
    let restorer = ArchiveRestorer::new(&fx.settings, Arc::new(LocalFs), rescanner.clone());
    let event = restorer.restore("NVIDIA").unwrap();
    assert_eq!(event.version.unwrap().to_string(), "1.0");
    assert_eq!(fx.read(Stage::Active, "NVIDIA_Driver_v1.0.exe").unwrap(), b"one");
    assert_eq!(rescanner.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_failed_native_seed_fails_closed() {
    let fx = Fixture::new(&["AMD"]);
    fx.put(Stage::Native, "AMD_Driver_v1.0.exe", b"factory");
    fx.put(Stage::New, "AMD_Driver_v2.0.exe", b"candidate");
    let faulty = FaultyFs {
        fail_copies: true,
        ..FaultyFs::default()
    };

    let run = fx
        .orchestrator(Arc::new(faulty), true, Arc::new(CountingRescanner::default()))
        .run_vendor("AMD");

    match &run.record.result {
        PromotionResult::Failed { kind, .. } => assert_eq!(*kind, FailureKind::Filesystem),
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(run.seed.is_none());
    assert!(fx.names(Stage::Active).is_empty());
    assert_eq!(fx.names(Stage::New), vec!["AMD_Driver_v2.0.exe"]);
    assert_eq!(fx.names(Stage::Native), vec!["AMD_Driver_v1.0.exe"]);
}

#[test]
fn test_vendor_matching_tolerates_case_drift() {
    let fx = Fixture::new(&["Nvidia"]);
    fx.put(Stage::Active, "NVIDIA_Driver_v1.0.exe", b"one");
    fx.put(Stage::New, "NVIDIA_Driver_v1.1.exe", b"two");

    let run = fx.local(true).run_vendor("Nvidia");
    assert_eq!(run.record.result, PromotionResult::Promoted);
}

#[tokio::test]
async fn test_one_vendor_failing_does_not_stop_the_others() -> Result<(), Box<dyn std::error::Error>> {
    let fx = Fixture::new(&["NVIDIA", "AMD", "Intel"]);
    fx.put(Stage::Active, "NVIDIA_Driver_v1.0.exe", b"n1");
    fx.put(Stage::New, "NVIDIA_Driver_vX.exe", b"broken");
    fx.put(Stage::Active, "AMD_Driver_v1.0.exe", b"a1");
    fx.put(Stage::New, "AMD_Driver_v1.2.exe", b"a2");

    let runs = Arc::new(fx.local(true)).run_all().await;

    assert_eq!(runs.len(), 3);
    assert!(runs[0].record.is_failed());
    assert_eq!(runs[1].record.result, PromotionResult::Promoted);
    assert_eq!(runs[2].record.result, PromotionResult::Skipped { reason: SkipReason::NoCandidate });
    assert_eq!(fx.names(Stage::Active), vec!["AMD_Driver_v1.2.exe", "NVIDIA_Driver_v1.0.exe"]);

    // Outcomes land in the journal in vendor order
    let journal = Journal::open(&fx.settings.journal_path);
    for run in &runs {
        journal.append_run(run)?;
    }
    let vendors: Vec<String> = journal
        .query_all()?
        .into_iter()
        .filter_map(|entry| match entry.event {
            JournalEvent::Promotion(record) => Some(record.vendor),
            _ => None,
        })
        .collect();
    assert_eq!(vendors, vec!["NVIDIA", "AMD", "Intel"]);
    Ok(())
}
