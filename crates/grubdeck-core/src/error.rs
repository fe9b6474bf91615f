//! Failure taxonomy for the installation pipeline.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::model::Outcome;

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("failed to fetch theme from {source_location}: {detail}")]
    Fetch {
        source_location: String,
        detail: String,
    },
    #[error("filesystem operation failed on {}: {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to update boot configuration {}: {source}", .path.display())]
    ConfigWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("no boot configuration regeneration command succeeded ({attempts})")]
    RegenerationExhausted { attempts: String },
    #[error("cannot start installer: {0}")]
    Invocation(String),
}

impl InstallError {
    pub fn filesystem(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Filesystem {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn config_write(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::ConfigWrite {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Outcome reported to the caller when this error ends a run.
    pub fn outcome(&self) -> Outcome {
        match self {
            InstallError::RegenerationExhausted { .. } => Outcome::RegenFailure,
            InstallError::Fetch { .. }
            | InstallError::Filesystem { .. }
            | InstallError::ConfigWrite { .. }
            | InstallError::Invocation(_) => Outcome::GenericFailure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_regeneration_maps_to_regen_failure() {
        let regen = InstallError::RegenerationExhausted {
            attempts: "update-grub: not found".into(),
        };
        assert_eq!(regen.outcome(), Outcome::RegenFailure);

        let fetch = InstallError::Fetch {
            source_location: "https://x/y".into(),
            detail: "exit status 128".into(),
        };
        assert_eq!(fetch.outcome(), Outcome::GenericFailure);

        let write = InstallError::config_write(
            "/etc/default/grub",
            io::Error::from(io::ErrorKind::PermissionDenied),
        );
        assert_eq!(write.outcome(), Outcome::GenericFailure);
        assert!(write.to_string().contains("/etc/default/grub"));
    }
}
