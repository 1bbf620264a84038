//! CLI Output Formatting Module
//! Colorized terminal output for runs, status and history

use colored::{ColoredString, Colorize};

use crate::engine::record::{PromotionRecord, PromotionResult};
use crate::engine::repository::{StageEntry, VendorStatus};
use crate::engine::version::Version;

pub struct CliFormatter;

impl CliFormatter {
    /// Print a success message
    pub fn success(message: &str) {
        println!("{} {}", "✓".green().bold(), message);
    }

    /// Print an error message
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red().bold(), message);
    }

    /// Print a warning message
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow().bold(), message);
    }

    /// Print an info message
    pub fn info(message: &str) {
        println!("{} {}", "ℹ".blue().bold(), message);
    }

    /// Print a section header
    pub fn header(title: &str) {
        println!("\n{}", title.bright_cyan().bold());
        println!("{}", "─".repeat(title.chars().count()).bright_black());
    }

    /// Print a key-value pair
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", key.bright_white().bold(), value);
    }

    /// Print a list item
    pub fn item(text: &str) {
        println!("  {} {}", "•".bright_black(), text);
    }

    /// One line per vendor outcome
    pub fn outcome(record: &PromotionRecord) {
        println!("  {} {}", outcome_symbol(&record.result), describe_outcome(record));
        if let PromotionResult::Failed { archived: Some(path), .. } = &record.result {
            println!(
                "    {} previous driver kept at {}",
                "↳".bright_black(),
                path.display().to_string().yellow()
            );
        }
    }

    /// Stage-by-stage view of one vendor
    pub fn vendor_status(status: &VendorStatus) {
        Self::header(&status.vendor);
        Self::kv("Native", &describe_entry(status.native.as_ref()));
        Self::kv("Active", &describe_entry(status.active.as_ref()));
        Self::kv("New", &describe_entry(status.candidate.as_ref()));
        if status.archived.is_empty() {
            Self::kv("Archive", "(empty)");
        } else {
            Self::kv("Archive", "");
            for entry in &status.archived {
                Self::item(&describe_entry(Some(entry)));
            }
        }
    }

    /// Print a divider
    pub fn divider() {
        println!("{}", "─".repeat(60).bright_black());
    }
}

pub fn outcome_symbol(result: &PromotionResult) -> ColoredString {
    match result {
        PromotionResult::Promoted => "✓".green().bold(),
        PromotionResult::Skipped { .. } => "·".bright_black(),
        PromotionResult::Declined => "⊘".yellow().bold(),
        PromotionResult::Failed { .. } => "✗".red().bold(),
    }
}

pub fn format_version(version: Option<&Version>) -> String {
    version.map_or_else(|| "none".to_string(), |v| format!("v{v}"))
}

/// Plain-text description of an outcome
pub fn describe_outcome(record: &PromotionRecord) -> String {
    let from = format_version(record.from_version.as_ref());
    let to = format_version(record.to_version.as_ref());
    match &record.result {
        PromotionResult::Promoted => format!("{}: promoted {} -> {}", record.vendor, from, to),
        PromotionResult::Skipped { reason } => {
            format!("{}: skipped ({:?}), current {}", record.vendor, reason, from)
        }
        PromotionResult::Declined => format!("{}: declined {} -> {}", record.vendor, from, to),
        PromotionResult::Failed { kind, cause, .. } => {
            format!("{}: failed ({:?}): {}", record.vendor, kind, cause)
        }
    }
}

pub fn describe_entry(entry: Option<&StageEntry>) -> String {
    match entry {
        None => "(none)".to_string(),
        Some(StageEntry { file_name, version: Some(v), .. }) => format!("{file_name} (v{v})"),
        Some(StageEntry { file_name, error, .. }) => format!(
            "{} (unversioned: {})",
            file_name,
            error.as_deref().unwrap_or("unknown")
        ),
    }
}
