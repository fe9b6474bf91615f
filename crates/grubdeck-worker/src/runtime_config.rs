//! Configuration loading and tracing setup for the worker.
//!
//! Logs go to stderr without colour; stdout belongs to the progress stream.

use std::io;

use anyhow::{Context, Result};
use grubdeck_core::InstallerConfig;
use tracing_subscriber::EnvFilter;

use super::Args;

pub(super) fn load_config(args: &Args) -> Result<InstallerConfig> {
    match args.config.as_ref() {
        Some(path) => InstallerConfig::load_from_path(path).context("read config from path"),
        None => InstallerConfig::load_default().context("read default config"),
    }
}

pub(super) fn init_tracing(config: &InstallerConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(config.general.log_level.as_deref().unwrap_or("warn"))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(false)
        .with_target(false)
        .init();
}
