//! Drives one installation and renders its events for a terminal.

use std::future::Future;
use std::io::{self, Write};

use grubdeck_core::{InstallEvent, InstallRequest, InstallResult, Installer, Outcome};
use tracing::warn;

/// Relay progress to `out` until the installer finishes. A resolved
/// `interrupt` cancels the run; the installer still reports the final result.
pub async fn run<I, W>(
    installer: &I,
    request: InstallRequest,
    interrupt: impl Future<Output = ()>,
    out: &mut W,
) -> InstallResult
where
    I: Installer + ?Sized,
    W: Write,
{
    let mut handle = installer.install(request);
    let mut interrupt = std::pin::pin!(interrupt);
    let mut interrupted = false;
    loop {
        tokio::select! {
            biased;
            event = handle.next_event() => match event {
                Some(InstallEvent::Progress(progress)) => {
                    let _ = writeln!(out, "[{:>3}%] {}", progress.percentage, progress.message);
                }
                Some(InstallEvent::Finished(result)) => return result,
                None => {
                    return InstallResult::generic_failure(
                        "installer stopped without reporting a result",
                    )
                }
            },
            _ = &mut interrupt, if !interrupted => {
                interrupted = true;
                warn!("interrupt received; cancelling installation");
                handle.cancel();
            }
        }
    }
}

/// Print the final message: success to `out`, failures and worker
/// diagnostics to `err`.
pub fn report(result: &InstallResult, out: &mut impl Write, err: &mut impl Write) -> io::Result<()> {
    match result.outcome {
        Outcome::Success => writeln!(out, "{}", result.message),
        Outcome::GenericFailure | Outcome::RegenFailure => {
            writeln!(err, "Error ({}): {}", result.outcome, result.message)?;
            let diagnostics = result.diagnostics.trim();
            if !diagnostics.is_empty() {
                writeln!(err, "--- worker output ---")?;
                writeln!(err, "{diagnostics}")?;
            }
            Ok(())
        }
    }
}

/// Wait for Ctrl-C; never resolves when the signal handler cannot be installed.
pub async fn ctrl_c() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}
