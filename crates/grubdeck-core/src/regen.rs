//! Boot configuration regeneration across distribution layouts.

use std::io;
use std::process::{Command, Stdio};

use tracing::{debug, info, warn};

use crate::config::RegenCommand;
use crate::error::InstallError;
use crate::util::{log_snippet, program_in_path};

/// Tries each candidate in order until one exits successfully.
pub struct Regenerator {
    candidates: Vec<RegenCommand>,
}

enum Attempt {
    Succeeded,
    Skipped(String),
    Failed(String),
}

impl Regenerator {
    pub fn new(candidates: Vec<RegenCommand>) -> Self {
        Self { candidates }
    }

    /// Returns the label of the command that succeeded.
    pub fn regenerate(&self) -> Result<String, InstallError> {
        let mut notes = Vec::with_capacity(self.candidates.len());
        for candidate in &self.candidates {
            let label = candidate.label();
            match run_candidate(candidate) {
                Attempt::Succeeded => {
                    info!(command = %label, "boot configuration regenerated");
                    return Ok(label);
                }
                Attempt::Skipped(reason) => {
                    debug!(command = %label, %reason, "regeneration candidate skipped");
                    notes.push(format!("{label}: {reason}"));
                }
                Attempt::Failed(reason) => {
                    warn!(command = %label, %reason, "regeneration candidate failed");
                    notes.push(format!("{label}: {reason}"));
                }
            }
        }
        let attempts = if notes.is_empty() {
            "no candidates configured".to_string()
        } else {
            notes.join("; ")
        };
        Err(InstallError::RegenerationExhausted { attempts })
    }

    /// True when at least one candidate is applicable and present on this system.
    pub fn any_available(&self) -> bool {
        self.candidates
            .iter()
            .any(|candidate| marker_present(candidate) && program_in_path(&candidate.program))
    }
}

fn marker_present(candidate: &RegenCommand) -> bool {
    candidate
        .when_exists
        .as_ref()
        .map_or(true, |marker| marker.exists())
}

fn run_candidate(candidate: &RegenCommand) -> Attempt {
    if let Some(marker) = candidate.when_exists.as_ref() {
        if !marker.exists() {
            return Attempt::Skipped(format!("{} not present", marker.display()));
        }
    }

    let output = Command::new(&candidate.program)
        .args(&candidate.args)
        .stdin(Stdio::null())
        .output();

    match output {
        Ok(output) if output.status.success() => Attempt::Succeeded,
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let snippet = log_snippet(&stderr);
            if snippet.is_empty() {
                Attempt::Failed(output.status.to_string())
            } else {
                Attempt::Failed(format!("{} ({})", output.status, snippet))
            }
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            Attempt::Skipped("not found".to_string())
        }
        Err(err) => Attempt::Failed(format!("failed to start: {err}")),
    }
}
