//! DriverStage CLI Module
//! Command-line interface for driver promotion

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::engine::locks::LockOperation;
use crate::engine::orchestrator::VendorRun;

pub mod formatter;

#[derive(Parser, Debug)]
#[command(name = "driverstage")]
#[command(author = "DriverStage Team")]
#[command(version)]
#[command(about = "Promote device drivers through Native, Active, New and Archive stages", long_about = None)]
pub struct Cli {
    /// Config file, or directory containing driverstage.config.json
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format (json for scripting)
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the stage folders and a template config
    Init {
        /// Base folder for the stages (relative to the config directory)
        #[arg(short, long, default_value = "drivers")]
        base: PathBuf,
    },

    /// Promote newer candidates from New into Active
    Run {
        /// Approve every promotion without asking
        #[arg(short, long)]
        yes: bool,

        /// Only process these vendors (repeatable)
        #[arg(long = "vendor")]
        vendors: Vec<String>,

        /// Process vendors one after another
        #[arg(long)]
        sequential: bool,
    },

    /// Show drivers in each stage
    Status {
        /// Only show these vendors (repeatable)
        #[arg(long = "vendor")]
        vendors: Vec<String>,
    },

    /// Move the newest archived driver back into an empty Active folder
    Restore {
        /// Vendor to restore
        #[arg(long)]
        vendor: String,
    },

    /// Show past promotion outcomes
    History {
        /// Only entries for this vendor
        #[arg(long)]
        vendor: Option<String>,

        /// Show at most this many of the latest entries
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

/// Exit status of `run` when at least one vendor failed
pub const EXIT_VENDOR_FAILED: u8 = 2;

/// Process exit status for a finished run
pub fn run_exit_status(runs: &[VendorRun]) -> u8 {
    if runs.iter().any(|run| run.record.is_failed()) {
        EXIT_VENDOR_FAILED
    } else {
        0
    }
}

impl Commands {
    /// Lock to hold while the command runs; only commands that move files
    /// in the stage folders take one
    pub fn lock_operation(&self) -> Option<LockOperation> {
        match self {
            Commands::Run { .. } => Some(LockOperation::Run),
            Commands::Restore { .. } => Some(LockOperation::Restore),
            Commands::Init { .. } | Commands::Status { .. } | Commands::History { .. } => None,
        }
    }
}

impl Cli {
    pub fn get_config_dir(&self) -> PathBuf {
        match &self.config {
            Some(path) if path.is_dir() => path.clone(),
            Some(path) => path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }
}
