//! DriverStage CLI - Main entry point
//!
//! This binary provides the `driverstage` tool for promoting drivers through
//! the stage folders.

use anyhow::Context;
use clap::Parser;
use driverstage_lib::engine::{
    approval::{Approver, PolicyApprover, PromptApprover},
    cli::{
        formatter::{describe_outcome, format_version, CliFormatter},
        run_exit_status, Cli, Commands, OutputFormat,
    },
    config::{Config, RunSettings, CONFIG_FILE},
    fs::{DriverFs, LocalFs},
    journal::{Journal, JournalEntry, JournalEvent},
    locks::{LockGuard, RunLock},
    logging,
    orchestrator::UpdateOrchestrator,
    repository::DriverRepository,
    rescan::{CommandRescanner, NoopRescanner, Rescanner},
    restore::ArchiveRestorer,
    stage::Stage,
};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_tracing(cli.log_json, logging::level_for(cli.verbose));

    match run_cli(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli(cli: Cli) -> anyhow::Result<ExitCode> {
    let json = cli.format == OutputFormat::Json;

    match &cli.command {
        Commands::Init { base } => {
            cmd_init(&cli.get_config_dir(), base, json)?;
        }
        Commands::Run { yes, vendors, sequential } => {
            let mut settings = load_settings(&cli)?;
            settings.select_vendors(vendors)?;
            if *sequential {
                settings.parallel = false;
            }
            let _lock = take_lock(&cli, &settings)?;
            let status = cmd_run(settings, *yes, json)?;
            return Ok(ExitCode::from(status));
        }
        Commands::Status { vendors } => {
            let mut settings = load_settings(&cli)?;
            settings.select_vendors(vendors)?;
            cmd_status(&settings, json)?;
        }
        Commands::Restore { vendor } => {
            let mut settings = load_settings(&cli)?;
            settings.select_vendors(std::slice::from_ref(vendor))?;
            let _lock = take_lock(&cli, &settings)?;
            cmd_restore(&settings, json)?;
        }
        Commands::History { vendor, limit } => {
            let settings = load_settings(&cli)?;
            cmd_history(&settings, vendor.as_deref(), *limit, json)?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Read and validate configuration once; nothing runs without it
fn load_settings(cli: &Cli) -> anyhow::Result<RunSettings> {
    let config_path = Config::locate(cli.config.as_deref())?;
    let config = Config::load_file(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let settings = config.resolve()?;
    settings.ensure_base_exists()?;
    tracing::debug!(config = %config_path.display(), vendors = ?settings.vendors, "configuration loaded");
    Ok(settings)
}

/// Single writer per base path for commands that move files
fn take_lock(cli: &Cli, settings: &RunSettings) -> anyhow::Result<Option<LockGuard>> {
    let Some(operation) = cli.command.lock_operation() else {
        return Ok(None);
    };
    let guard = RunLock::new(&settings.base_path).acquire(operation)?;
    tracing::debug!(?operation, "lock acquired");
    Ok(Some(guard))
}

fn build_rescanner(settings: &RunSettings) -> Arc<dyn Rescanner> {
    let command = match &settings.rescan_command {
        Some(argv) => CommandRescanner::from_argv(argv),
        None => CommandRescanner::platform_default(),
    };
    match command {
        Some(rescanner) => Arc::new(rescanner),
        None => Arc::new(NoopRescanner),
    }
}

fn cmd_init(config_dir: &Path, base: &Path, json: bool) -> anyhow::Result<()> {
    std::fs::create_dir_all(config_dir)?;

    let config_path = config_dir.join(CONFIG_FILE);
    let created_config = !config_path.exists();
    if created_config {
        Config::default_template(base).save(config_dir)?;
    }

    let settings = Config::load_file(&config_path)?.resolve()?;
    std::fs::create_dir_all(&settings.base_path)?;
    for stage in Stage::ALL {
        std::fs::create_dir_all(settings.stages.dir(stage))?;
    }

    if json {
        println!("{}", serde_json::json!({
            "success": true,
            "config": config_path.display().to_string(),
            "created_config": created_config,
            "base_path": settings.base_path.display().to_string(),
        }));
    } else {
        if created_config {
            CliFormatter::success(&format!("Wrote {}", config_path.display()));
        } else {
            CliFormatter::info(&format!("Using existing {}", config_path.display()));
        }
        CliFormatter::success(&format!("Stage folders ready under {}", settings.base_path.display()));
        for stage in Stage::ALL {
            CliFormatter::item(&settings.stages.dir(stage).display().to_string());
        }
    }

    Ok(())
}

#[tokio::main]
async fn cmd_run(settings: RunSettings, yes: bool, json: bool) -> anyhow::Result<u8> {
    let fs: Arc<dyn DriverFs> = Arc::new(LocalFs);
    let approver: Arc<dyn Approver> = if yes || settings.auto_approve {
        Arc::new(PolicyApprover::always())
    } else {
        Arc::new(PromptApprover::stdin())
    };
    let orchestrator = Arc::new(UpdateOrchestrator::new(
        &settings,
        fs,
        approver,
        build_rescanner(&settings),
    ));

    tracing::info!(vendors = settings.vendors.len(), parallel = settings.parallel, "starting run");
    let runs = orchestrator.run_all().await;

    let journal = Journal::open(&settings.journal_path);
    for run in &runs {
        if let Err(e) = journal.append_run(run) {
            tracing::warn!(vendor = %run.record.vendor, error = %e, "could not write journal entry");
        }
    }

    let status = run_exit_status(&runs);

    if json {
        println!("{}", serde_json::to_string_pretty(&serde_json::json!({
            "run_id": journal.run_id(),
            "vendors": runs,
        }))?);
    } else {
        CliFormatter::header("Driver promotion");
        for run in &runs {
            if let Some(seed) = &run.seed {
                CliFormatter::info(&format!(
                    "{}: seeded Active from Native ({})",
                    seed.vendor,
                    format_version(seed.version.as_ref())
                ));
            }
            CliFormatter::outcome(&run.record);
        }
        if status != 0 {
            CliFormatter::warning("Some vendors failed; see messages above");
        }
    }

    Ok(status)
}

fn cmd_status(settings: &RunSettings, json: bool) -> anyhow::Result<()> {
    let repository = DriverRepository::new(
        Arc::new(LocalFs),
        settings.stages.clone(),
        settings.pattern.clone(),
    );
    let statuses = settings
        .vendors
        .iter()
        .map(|vendor| repository.vendor_status(vendor))
        .collect::<Result<Vec<_>, _>>()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&statuses)?);
    } else {
        CliFormatter::kv("Base path", &settings.base_path.display().to_string());
        for status in &statuses {
            CliFormatter::vendor_status(status);
        }
    }

    Ok(())
}

fn cmd_restore(settings: &RunSettings, json: bool) -> anyhow::Result<()> {
    let vendor = settings
        .vendors
        .first()
        .context("no vendor selected")?;

    let restorer = ArchiveRestorer::new(settings, Arc::new(LocalFs), build_rescanner(settings));
    let event = restorer.restore(vendor)?;

    let journal = Journal::open(&settings.journal_path);
    if let Err(e) = journal.append(JournalEvent::Restore(event.clone())) {
        tracing::warn!(vendor = %vendor, error = %e, "could not write journal entry");
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&event)?);
    } else {
        CliFormatter::success(&format!(
            "{}: restored {} to Active",
            vendor,
            format_version(event.version.as_ref())
        ));
        CliFormatter::kv("From", &event.source.display().to_string());
        CliFormatter::kv("To", &event.destination.display().to_string());
    }

    Ok(())
}

fn cmd_history(
    settings: &RunSettings,
    vendor: Option<&str>,
    limit: Option<usize>,
    json: bool,
) -> anyhow::Result<()> {
    let journal = Journal::open(&settings.journal_path);
    let mut entries = match vendor {
        Some(vendor) => journal.query_vendor(vendor)?,
        None => journal.query_all()?,
    };
    if let Some(limit) = limit {
        let skip = entries.len().saturating_sub(limit);
        entries.drain(..skip);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        CliFormatter::info("No journal entries yet");
        return Ok(());
    }

    CliFormatter::header("History");
    for entry in &entries {
        println!("  {}  {}", entry.written_at.format("%Y-%m-%d %H:%M:%S"), describe_entry(entry));
    }
    Ok(())
}

fn describe_entry(entry: &JournalEntry) -> String {
    match &entry.event {
        JournalEvent::Promotion(record) => describe_outcome(record),
        JournalEvent::Seed(seed) => format!(
            "{}: seeded Active from Native ({})",
            seed.vendor,
            format_version(seed.version.as_ref())
        ),
        JournalEvent::Restore(event) => format!(
            "{}: restored {} from Archive",
            event.vendor,
            format_version(event.version.as_ref())
        ),
    }
}
