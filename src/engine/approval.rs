//! Approval Collaborator
//!
//! Asked once per vendor before a promotion touches the stage folders.

use std::io::{self, BufRead, BufReader, Stdin, Write};
use std::sync::Mutex;

pub trait Approver: Send + Sync {
    fn confirm(&self, prompt: &str) -> bool;
}

/// Fixed answer, for `--yes`, `auto_approve` and tests
#[derive(Debug, Clone, Copy)]
pub struct PolicyApprover {
    approve: bool,
}

impl PolicyApprover {
    pub fn new(approve: bool) -> Self {
        Self { approve }
    }

    pub fn always() -> Self {
        Self::new(true)
    }

    pub fn never() -> Self {
        Self::new(false)
    }
}

impl Approver for PolicyApprover {
    fn confirm(&self, prompt: &str) -> bool {
        tracing::debug!(prompt, approve = self.approve, "approval by policy");
        self.approve
    }
}

/// Interactive y/N prompt.
///
/// Vendor workers run in parallel; the mutex keeps one question on screen at
/// a time and only blocks the vendor waiting for its turn.
pub struct PromptApprover<R> {
    input: Mutex<R>,
}

impl PromptApprover<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(io::stdin()))
    }
}

impl<R: BufRead + Send> PromptApprover<R> {
    pub fn new(input: R) -> Self {
        Self {
            input: Mutex::new(input),
        }
    }

    fn ask(input: &mut R, prompt: &str) -> io::Result<bool> {
        let mut stderr = io::stderr().lock();
        write!(stderr, "{prompt} [y/N] ")?;
        stderr.flush()?;

        let mut answer = String::new();
        if input.read_line(&mut answer)? == 0 {
            return Ok(false);
        }
        let answer = answer.trim().to_ascii_lowercase();
        Ok(answer == "y" || answer == "yes")
    }
}

impl<R: BufRead + Send> Approver for PromptApprover<R> {
    fn confirm(&self, prompt: &str) -> bool {
        let mut input = match self.input.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match Self::ask(&mut input, prompt) {
            Ok(answer) => answer,
            Err(e) => {
                tracing::warn!(error = %e, "could not read approval, treating as refusal");
                false
            }
        }
    }
}
