//! Request, progress, and result types shared across the privilege boundary.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Worker exit status for a completed installation.
pub const EXIT_SUCCESS: i32 = 0;
/// Worker exit status for any failure before regeneration.
pub const EXIT_GENERIC_FAILURE: i32 = 1;
/// Worker exit status when files and config are in place but regeneration failed.
pub const EXIT_REGEN_FAILURE: i32 = 2;

/// Instruction appended to every regeneration failure shown to the user.
pub const REGEN_MANUAL_HINT: &str =
    "Theme installed but failed to update GRUB. Please run 'sudo update-grub' \
     (or 'sudo grub-mkconfig -o /boot/grub/grub.cfg') manually.";

const URL_SCHEMES: &[&str] = &["https", "http", "git", "ssh", "file"];
const MAX_THEME_NAME_LEN: usize = 255;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("theme name must not be empty")]
    EmptyThemeName,
    #[error("theme name {0:?} is not a safe directory name")]
    UnsafeThemeName(String),
    #[error("source location must not be empty")]
    EmptySource,
    #[error("source location {0:?} is not a fetchable location")]
    UnsupportedSource(String),
}

/// A single theme installation, validated at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRequest {
    theme_name: String,
    source_location: String,
}

impl InstallRequest {
    pub fn new(
        theme_name: impl Into<String>,
        source_location: impl Into<String>,
    ) -> Result<Self, RequestError> {
        let theme_name = theme_name.into();
        let source_location = source_location.into();
        validate_theme_name(&theme_name)?;
        validate_source(&source_location)?;
        Ok(Self {
            theme_name,
            source_location,
        })
    }

    pub fn theme_name(&self) -> &str {
        &self.theme_name
    }

    pub fn source_location(&self) -> &str {
        &self.source_location
    }
}

fn validate_theme_name(name: &str) -> Result<(), RequestError> {
    if name.is_empty() {
        return Err(RequestError::EmptyThemeName);
    }
    let unsafe_name = name == "."
        || name == ".."
        || name.starts_with('-')
        || name.len() > MAX_THEME_NAME_LEN
        || name
            .chars()
            .any(|ch| matches!(ch, '/' | '\\' | '"' | '$' | '`') || ch.is_control());
    if unsafe_name {
        return Err(RequestError::UnsafeThemeName(name.to_string()));
    }
    Ok(())
}

fn validate_source(source: &str) -> Result<(), RequestError> {
    if source.trim().is_empty() {
        return Err(RequestError::EmptySource);
    }
    let unsupported = || RequestError::UnsupportedSource(source.to_string());
    // Leading dashes would be read as options by the fetch command.
    if source.starts_with('-') || source.chars().any(char::is_whitespace) {
        return Err(unsupported());
    }
    if Path::new(source).is_absolute() {
        return Ok(());
    }
    if let Ok(url) = Url::parse(source) {
        return if URL_SCHEMES.contains(&url.scheme()) {
            Ok(())
        } else {
            Err(unsupported())
        };
    }
    if is_scp_like(source) {
        return Ok(());
    }
    Err(unsupported())
}

// user@host:path, the short ssh form git accepts.
fn is_scp_like(source: &str) -> bool {
    let Some((user_host, path)) = source.split_once(':') else {
        return false;
    };
    let Some((user, host)) = user_host.split_once('@') else {
        return false;
    };
    !user.is_empty() && !host.is_empty() && !path.is_empty() && !host.contains('/')
}

/// A progress checkpoint reported by the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub percentage: u8,
    pub message: String,
}

impl ProgressEvent {
    /// Builds an event, rejecting out-of-range percentages and empty messages.
    pub fn new(percentage: u8, message: impl Into<String>) -> Option<Self> {
        let message = message.into();
        if percentage > 100 || message.trim().is_empty() {
            return None;
        }
        Some(Self {
            percentage,
            message,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    GenericFailure,
    RegenFailure,
}

impl Outcome {
    pub fn exit_code(self) -> i32 {
        match self {
            Outcome::Success => EXIT_SUCCESS,
            Outcome::GenericFailure => EXIT_GENERIC_FAILURE,
            Outcome::RegenFailure => EXIT_REGEN_FAILURE,
        }
    }

    /// Maps a worker exit status; signals and unknown codes are generic failures.
    pub fn from_exit_code(code: Option<i32>) -> Self {
        match code {
            Some(EXIT_SUCCESS) => Outcome::Success,
            Some(EXIT_REGEN_FAILURE) => Outcome::RegenFailure,
            _ => Outcome::GenericFailure,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::GenericFailure => "failed",
            Outcome::RegenFailure => "installed, regeneration failed",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Terminal result of one installation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallResult {
    pub outcome: Outcome,
    pub message: String,
    /// Worker stderr, verbatim.
    pub diagnostics: String,
}

impl InstallResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Success,
            message: message.into(),
            diagnostics: String::new(),
        }
    }

    pub fn generic_failure(message: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::GenericFailure,
            message: message.into(),
            diagnostics: String::new(),
        }
    }

    /// Regeneration failure; the manual-regeneration hint is always included.
    pub fn regen_failure(detail: impl AsRef<str>) -> Self {
        let detail = detail.as_ref().trim();
        let message = if detail.is_empty() {
            REGEN_MANUAL_HINT.to_string()
        } else if detail.contains(REGEN_MANUAL_HINT) {
            detail.to_string()
        } else {
            format!("{detail}\n{REGEN_MANUAL_HINT}")
        };
        Self {
            outcome: Outcome::RegenFailure,
            message,
            diagnostics: String::new(),
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: impl Into<String>) -> Self {
        self.diagnostics = diagnostics.into();
        self
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }
}
