//! Stage sequencing for one theme installation.
//!
//! Stages run strictly in order and never step back. Each one reports a fixed
//! checkpoint when it starts and, for the long-running ones, when it finishes.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use grubdeck_core::{
    BootConfigDocument, InstallError, InstallRequest, InstallerConfig, Regenerator,
};
use tracing::{info, warn};

use crate::install::{check_theme_structure, install_theme};
use crate::report::ProgressReporter;
use crate::staging::{fetch, StagingArea};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Stage {
    Init,
    Staging,
    Installing,
    ConfigWrite,
    Regenerating,
    Done,
}

pub const PLAN: [Stage; 6] = [
    Stage::Init,
    Stage::Staging,
    Stage::Installing,
    Stage::ConfigWrite,
    Stage::Regenerating,
    Stage::Done,
];

impl Stage {
    fn start_checkpoint(self) -> u8 {
        match self {
            Stage::Init => 5,
            Stage::Staging => 10,
            Stage::Installing => 50,
            Stage::ConfigWrite => 80,
            Stage::Regenerating => 95,
            Stage::Done => 100,
        }
    }

    fn end_checkpoint(self) -> Option<(u8, &'static str)> {
        match self {
            Stage::Staging => Some((40, "Repository cloned successfully.")),
            Stage::Installing => Some((70, "Theme files copied.")),
            Stage::ConfigWrite => Some((90, "GRUB configuration updated.")),
            Stage::Init | Stage::Regenerating | Stage::Done => None,
        }
    }

    fn start_message(self, ctx: &PipelineContext) -> String {
        match self {
            Stage::Init => format!(
                "Starting installation of '{}'...",
                ctx.request.theme_name()
            ),
            Stage::Staging => "Cloning theme repository...".to_string(),
            Stage::Installing => "Moving theme to GRUB directory...".to_string(),
            Stage::ConfigWrite => "Updating GRUB configuration...".to_string(),
            Stage::Regenerating => "Regenerating GRUB boot configuration...".to_string(),
            Stage::Done => "Installation complete.".to_string(),
        }
    }
}

/// Per-run state threaded through the stages.
pub struct PipelineContext<'a> {
    pub config: &'a InstallerConfig,
    pub request: &'a InstallRequest,
    staging: Option<StagingArea>,
    installed: Option<PathBuf>,
    regenerated_with: Option<String>,
}

impl<'a> PipelineContext<'a> {
    pub fn new(config: &'a InstallerConfig, request: &'a InstallRequest) -> Self {
        Self {
            config,
            request,
            staging: None,
            installed: None,
            regenerated_with: None,
        }
    }
}

/// Run every stage, returning the summary shown to the user on success.
///
/// The staging directory is owned by the context and removed when the context
/// goes out of scope, whichever stage ends the run.
pub fn run<W: Write>(
    config: &InstallerConfig,
    request: &InstallRequest,
    reporter: &mut ProgressReporter<W>,
) -> Result<String, InstallError> {
    let mut ctx = PipelineContext::new(config, request);
    for stage in PLAN {
        reporter.progress(stage.start_checkpoint(), stage.start_message(&ctx));
        run_stage(stage, &mut ctx)?;
        if let Some((percentage, message)) = stage.end_checkpoint() {
            reporter.progress(percentage, message);
        }
    }

    let regenerated_with = ctx.regenerated_with.unwrap_or_default();
    Ok(format!(
        "Theme '{}' installed successfully (boot configuration regenerated with {}).",
        request.theme_name(),
        regenerated_with
    ))
}

pub fn run_stage(stage: Stage, ctx: &mut PipelineContext) -> Result<(), InstallError> {
    match stage {
        Stage::Init | Stage::Done => Ok(()),
        Stage::Staging => stage_fetch(ctx),
        Stage::Installing => stage_install(ctx),
        Stage::ConfigWrite => stage_config_write(ctx),
        Stage::Regenerating => stage_regenerate(ctx),
    }
}

fn stage_fetch(ctx: &mut PipelineContext) -> Result<(), InstallError> {
    let staging = StagingArea::prepare(&ctx.config.paths.staging_dir)?;
    // Hand ownership to the context first so a failed fetch still cleans up.
    let staging = ctx.staging.insert(staging);
    fetch(&ctx.config.fetch, ctx.request.source_location(), staging)
}

fn stage_install(ctx: &mut PipelineContext) -> Result<(), InstallError> {
    let staging = ctx.staging.take().ok_or_else(|| {
        InstallError::Invocation("install stage reached without fetched content".to_string())
    })?;
    let installed = install_theme(
        staging.path(),
        &ctx.config.paths.themes_root,
        ctx.request.theme_name(),
        &ctx.config.theme.asset_subdir,
    )?;
    drop(staging);
    check_theme_structure(&installed, &ctx.config.theme.asset_file);
    ctx.installed = Some(installed);
    Ok(())
}

fn stage_config_write(ctx: &mut PipelineContext) -> Result<(), InstallError> {
    let config = ctx.config;
    let path = &config.paths.boot_config;
    let asset = config.theme_asset_path(ctx.request.theme_name());

    let mut document = BootConfigDocument::read(path)?;
    if let Some(backup) = config.paths.backup.as_ref() {
        fs::copy(path, backup).map_err(|err| InstallError::config_write(backup, err))?;
        info!(backup = %backup.display(), "boot configuration snapshot saved");
    }
    document.apply_theme(&config.theme.key, &asset);
    document.write(path)?;
    info!(
        path = %path.display(),
        key = %config.theme.key,
        asset = %asset.display(),
        "boot configuration updated"
    );
    Ok(())
}

fn stage_regenerate(ctx: &mut PipelineContext) -> Result<(), InstallError> {
    let regenerator = Regenerator::new(ctx.config.regen.clone());
    match regenerator.regenerate() {
        Ok(label) => {
            ctx.regenerated_with = Some(label);
            Ok(())
        }
        Err(err) => {
            warn!(
                installed = ?ctx.installed,
                "theme files and boot configuration are in place but regeneration failed"
            );
            Err(err)
        }
    }
}
