//! Run Lock
//!
//! One writer per base path: `run` and `restore` both mutate the stage
//! folders and must not overlap.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const LOCK_FILE: &str = "driverstage.lock";

/// Operations that take the lock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockOperation {
    Run,
    Restore,
}

impl LockOperation {
    pub fn description(&self) -> &'static str {
        match self {
            LockOperation::Run => "Driver promotion run in progress",
            LockOperation::Restore => "Archive restore in progress",
        }
    }
}

/// Information stored in the lock file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    pub operation: LockOperation,
    pub pid: u32,
    pub started_at: DateTime<Utc>,
    pub description: String,
}

impl LockInfo {
    pub fn new(operation: LockOperation) -> Self {
        Self {
            operation,
            pid: std::process::id(),
            started_at: Utc::now(),
            description: operation.description().to_string(),
        }
    }

    /// Check if the process that created the lock is still running
    pub fn is_process_alive(&self) -> bool {
        if self.pid == std::process::id() {
            return true;
        }

        #[cfg(unix)]
        {
            use std::process::Command;
            Command::new("kill")
                .args(["-0", &self.pid.to_string()])
                .output()
                .map(|o| o.status.success())
                .unwrap_or(false)
        }

        #[cfg(windows)]
        {
            use std::process::Command;
            Command::new("tasklist")
                .args(["/FI", &format!("PID eq {}", self.pid)])
                .output()
                .map(|o| String::from_utf8_lossy(&o.stdout).contains(&self.pid.to_string()))
                .unwrap_or(false)
        }

        #[cfg(not(any(unix, windows)))]
        true
    }
}

#[derive(Error, Debug)]
pub enum LockError {
    #[error("{operation:?} lock held by PID {pid}: {description}")]
    AlreadyLocked {
        operation: LockOperation,
        pid: u32,
        description: String,
    },
    #[error("Lock IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Lock serialize error: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub struct RunLock {
    lock_path: PathBuf,
}

impl RunLock {
    pub fn new(base_path: &Path) -> Self {
        Self {
            lock_path: base_path.join(LOCK_FILE),
        }
    }

    /// Current holder, if the lock file exists and is readable
    pub fn holder(&self) -> Option<LockInfo> {
        fs::read_to_string(&self.lock_path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
    }

    pub fn acquire(&self, operation: LockOperation) -> Result<LockGuard, LockError> {
        if let Some(existing) = self.holder() {
            if existing.is_process_alive() {
                return Err(LockError::AlreadyLocked {
                    operation: existing.operation,
                    pid: existing.pid,
                    description: existing.description,
                });
            }
            tracing::warn!(pid = existing.pid, "removing stale lock");
            let _ = fs::remove_file(&self.lock_path);
        }

        let content = serde_json::to_string_pretty(&LockInfo::new(operation))?;
        // create_new so two starters racing past the check cannot both win
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.lock_path)
            .map_err(|e| match e.kind() {
                io::ErrorKind::AlreadyExists => LockError::AlreadyLocked {
                    operation,
                    pid: 0,
                    description: "lock taken concurrently".to_string(),
                },
                _ => LockError::Io(e),
            })?;
        file.write_all(content.as_bytes())?;

        Ok(LockGuard {
            lock_path: self.lock_path.clone(),
            operation,
        })
    }
}

/// RAII guard that releases the lock on drop
pub struct LockGuard {
    lock_path: PathBuf,
    operation: LockOperation,
}

impl LockGuard {
    pub fn operation(&self) -> LockOperation {
        self.operation
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.lock_path);
    }
}
