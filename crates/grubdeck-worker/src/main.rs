//! Privileged GrubDeck worker.
//!
//! Runs one theme installation and reports on stdout, one JSON message per
//! line. Exit status: 0 installed, 1 failed, 2 installed but GRUB was not
//! regenerated.

mod install;
mod pipeline;
mod process;
mod report;
#[path = "runtime_config.rs"]
mod runtime_config;
mod staging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use grubdeck_core::{InstallRequest, InstallerConfig, Outcome, REGEN_MANUAL_HINT};
use tracing::error;

use crate::report::ProgressReporter;
use crate::runtime_config::{init_tracing, load_config};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to config.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory name for the theme under the themes root
    theme_name: String,

    /// Repository or path to fetch the theme from
    source_location: String,
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            // clap would exit with 2, which callers read as a regeneration failure.
            return if err.use_stderr() {
                exit_code(Outcome::GenericFailure)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err:#}");
            return exit_code(Outcome::GenericFailure);
        }
    };
    init_tracing(&config);

    let mut reporter = ProgressReporter::stdout();
    exit_code(install(&args, &config, &mut reporter))
}

fn install(
    args: &Args,
    config: &InstallerConfig,
    reporter: &mut ProgressReporter<std::io::Stdout>,
) -> Outcome {
    let request = match InstallRequest::new(&args.theme_name, &args.source_location) {
        Ok(request) => request,
        Err(err) => {
            eprintln!("Error: {err}");
            reporter.done(Outcome::GenericFailure, err.to_string());
            return Outcome::GenericFailure;
        }
    };

    match pipeline::run(config, &request, reporter) {
        Ok(summary) => {
            reporter.done(Outcome::Success, summary);
            Outcome::Success
        }
        Err(err) => {
            let outcome = err.outcome();
            error!(theme = request.theme_name(), %outcome, "installation failed");
            eprintln!("Error: {err}");
            let message = match outcome {
                Outcome::RegenFailure => format!("{err}\n{REGEN_MANUAL_HINT}"),
                _ => err.to_string(),
            };
            reporter.done(outcome, message);
            outcome
        }
    }
}

fn exit_code(outcome: Outcome) -> ExitCode {
    ExitCode::from(outcome.exit_code() as u8)
}
