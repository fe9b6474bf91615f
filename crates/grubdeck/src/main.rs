//! Terminal front-end for GrubDeck theme installation.

mod checks;
mod install;
#[path = "runtime_config.rs"]
mod runtime_config;

use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use grubdeck_core::{InstallRequest, InstallerConfig, Outcome, ProcessInstaller};

use crate::checks::Checks;
use crate::runtime_config::{init_tracing, load_config};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch a theme, install it, and select it in the boot configuration
    Install {
        theme_name: String,
        source_location: String,
        /// Worker binary to run instead of the configured one
        #[arg(long)]
        worker: Option<PathBuf>,
    },
    /// Report whether this system is ready for an install
    Check,
    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            // Exit status 2 is reserved for regeneration failures.
            return Ok(if err.use_stderr() {
                exit_code(Outcome::GenericFailure)
            } else {
                ExitCode::SUCCESS
            });
        }
    };
    let config = load_config(args.config.as_deref())?;
    init_tracing(&config);

    match args.command {
        Command::Install {
            theme_name,
            source_location,
            worker,
        } => {
            let request = InstallRequest::new(&theme_name, &source_location)
                .context("invalid install request")?;
            let installer = installer_for(&config, args.config.as_deref(), worker)?;
            let result =
                install::run(&installer, request, install::ctrl_c(), &mut io::stdout()).await;
            install::report(&result, &mut io::stdout(), &mut io::stderr())
                .context("write install result")?;
            Ok(exit_code(result.outcome))
        }
        Command::Check => {
            let checks = Checks::run(&config);
            print!("{}", checks.render());
            match checks.ready() {
                Ok(()) => Ok(ExitCode::SUCCESS),
                Err(reason) => {
                    eprintln!("Not ready: {reason}");
                    Ok(exit_code(Outcome::GenericFailure))
                }
            }
        }
        Command::Config => {
            print!("{}", config.to_toml().context("render config")?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn installer_for(
    config: &InstallerConfig,
    config_path: Option<&Path>,
    worker: Option<PathBuf>,
) -> Result<ProcessInstaller> {
    let mut elevation = config.elevation.clone();
    if worker.is_some() {
        elevation.worker_path = worker;
    }
    // The worker reads the same file unless one is configured for it.
    if elevation.worker_config.is_none() {
        if let Some(path) = config_path {
            let path = std::path::absolute(path).context("resolve config path")?;
            elevation.worker_config = Some(path);
        }
    }
    Ok(ProcessInstaller::from_config(&elevation))
}

fn exit_code(outcome: Outcome) -> ExitCode {
    ExitCode::from(outcome.exit_code() as u8)
}
