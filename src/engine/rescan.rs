//! Device Rescan Collaborator
//!
//! Tells the OS to pick up a newly installed driver. Best effort: a failed
//! rescan is logged and never turns a promotion into a failure.

use std::process::{Command, Stdio};

pub trait Rescanner: Send + Sync {
    fn notify_driver_installed(&self, vendor: &str);
}

/// Does nothing; used when no rescan command is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRescanner;

impl Rescanner for NoopRescanner {
    fn notify_driver_installed(&self, vendor: &str) {
        tracing::debug!(vendor, "no rescan command configured");
    }
}

/// Runs an external command such as `pnputil /scan-devices`
#[derive(Debug, Clone)]
pub struct CommandRescanner {
    program: String,
    args: Vec<String>,
}

impl CommandRescanner {
    /// Build from an argv list; `None` when the list is empty
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    /// Platform default, if the platform has one
    pub fn platform_default() -> Option<Self> {
        #[cfg(target_os = "windows")]
        {
            Some(Self {
                program: "pnputil".to_string(),
                args: vec!["/scan-devices".to_string()],
            })
        }

        #[cfg(not(target_os = "windows"))]
        {
            None
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn run(&self) -> Result<(), String> {
        let status = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| format!("failed to start {}: {}", self.program, e))?;

        if status.success() {
            Ok(())
        } else {
            Err(format!("{} exited with {:?}", self.program, status.code()))
        }
    }
}

impl Rescanner for CommandRescanner {
    fn notify_driver_installed(&self, vendor: &str) {
        match self.run() {
            Ok(()) => tracing::info!(vendor, program = %self.program, "device rescan requested"),
            Err(reason) => tracing::warn!(vendor, %reason, "device rescan failed"),
        }
    }
}
