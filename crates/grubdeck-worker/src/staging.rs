//! Run-exclusive staging directory and the shallow fetch into it.

use std::fs::{self, DirBuilder};
use std::io;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};
use std::process::Command;

use grubdeck_core::{FetchConfig, InstallError};
use tracing::{info, warn};

use crate::process::run_command;

const STAGING_MODE: u32 = 0o700;

/// Owns the staging directory; removes it when dropped, including during unwinding.
#[derive(Debug)]
pub struct StagingArea {
    path: PathBuf,
}

impl StagingArea {
    /// Clear anything left at `path` by an earlier run and create it afresh,
    /// private to this process. Fails if something recreates `path` in between.
    pub fn prepare(path: &Path) -> Result<Self, InstallError> {
        remove_existing(path).map_err(|err| InstallError::filesystem(path, err))?;
        if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            DirBuilder::new()
                .recursive(true)
                .mode(STAGING_MODE)
                .create(parent)
                .map_err(|err| InstallError::filesystem(parent, err))?;
        }
        DirBuilder::new()
            .mode(STAGING_MODE)
            .create(path)
            .map_err(|err| InstallError::filesystem(path, err))?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagingArea {
    fn drop(&mut self) {
        if let Err(err) = remove_existing(&self.path) {
            warn!(path = %self.path.display(), %err, "failed to remove staging directory");
        }
    }
}

pub(crate) fn remove_existing(path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

/// Fetch a single revision of `source` into the staging directory.
pub fn fetch(config: &FetchConfig, source: &str, staging: &StagingArea) -> Result<(), InstallError> {
    let fetch_error = |detail: String| InstallError::Fetch {
        source_location: source.to_string(),
        detail,
    };

    let (program, leading) = config
        .command
        .split_first()
        .ok_or_else(|| fetch_error("no fetch command configured".to_string()))?;
    let mut command = Command::new(program);
    command.args(leading).arg(source).arg(staging.path());

    let label = config.command.join(" ");
    run_command(&label, command).map_err(|err| fetch_error(err.to_string()))?;

    let populated = fs::read_dir(staging.path())
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false);
    if !populated {
        return Err(fetch_error("fetch produced no content".to_string()));
    }
    info!(source, staging = %staging.path().display(), "theme fetched");
    Ok(())
}
