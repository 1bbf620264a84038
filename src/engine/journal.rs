//! Outcome Journal
//!
//! Append-only, line-delimited JSON log of promotion records and seed events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::orchestrator::VendorRun;
use super::record::{PromotionRecord, SeedEvent};

/// Current journal line format version
pub const JOURNAL_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JournalEvent {
    Promotion(PromotionRecord),
    Seed(SeedEvent),
    /// Operator moved an archived driver back into Active
    Restore(SeedEvent),
}

impl JournalEvent {
    pub fn vendor(&self) -> &str {
        match self {
            Self::Promotion(record) => &record.vendor,
            Self::Seed(event) | Self::Restore(event) => &event.vendor,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    #[serde(rename = "journal_version")]
    pub version: u32,
    pub run_id: Uuid,
    pub written_at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: JournalEvent,
}

pub struct Journal {
    log_path: PathBuf,
    run_id: Uuid,
}

impl Journal {
    /// Open the journal for a new invocation; the file is created on first append
    pub fn open(log_path: &Path) -> Self {
        Self {
            log_path: log_path.to_path_buf(),
            run_id: Uuid::new_v4(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn path(&self) -> &Path {
        &self.log_path
    }

    pub fn append(&self, event: JournalEvent) -> io::Result<()> {
        if let Some(parent) = self.log_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;

        let entry = JournalEntry {
            version: JOURNAL_VERSION,
            run_id: self.run_id,
            written_at: Utc::now(),
            event,
        };
        let line = serde_json::to_string(&entry)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        writeln!(file, "{}", line)?;
        Ok(())
    }

    /// Record a vendor run: its seed event first, then the outcome
    pub fn append_run(&self, run: &VendorRun) -> io::Result<()> {
        if let Some(seed) = &run.seed {
            self.append(JournalEvent::Seed(seed.clone()))?;
        }
        self.append(JournalEvent::Promotion(run.record.clone()))
    }

    pub fn query_all(&self) -> io::Result<Vec<JournalEntry>> {
        if !self.log_path.exists() {
            return Ok(vec![]);
        }

        let reader = BufReader::new(fs::File::open(&self.log_path)?);
        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let entry: JournalEntry = serde_json::from_str(&line)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

            // Older entries stay readable
            if entry.version <= JOURNAL_VERSION {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    pub fn query_vendor(&self, vendor: &str) -> io::Result<Vec<JournalEntry>> {
        Ok(self
            .query_all()?
            .into_iter()
            .filter(|e| e.event.vendor().eq_ignore_ascii_case(vendor))
            .collect())
    }
}
