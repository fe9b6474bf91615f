//! Configuration loading and tracing setup.

use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use grubdeck_core::InstallerConfig;
use tracing_subscriber::EnvFilter;

pub(super) fn load_config(path: Option<&Path>) -> Result<InstallerConfig> {
    match path {
        Some(path) => InstallerConfig::load_from_path(path).context("read config from path"),
        None => InstallerConfig::load_default().context("read default config"),
    }
}

pub(super) fn init_tracing(config: &InstallerConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(
            config
                .general
                .log_level
                .clone()
                .unwrap_or_else(|| "info".to_string()),
        )
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}
