//! Elevated worker process supervision.

use std::env;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::config::ElevationConfig;
use crate::error::InstallError;
use crate::model::{InstallRequest, InstallResult, Outcome};
use crate::protocol::{ProgressTracker, WorkerMessage};
use crate::util::{find_program, is_root, log_snippet};

use super::{EventSink, InstallHandle, Installer};

/// File name of the privileged worker binary.
pub const WORKER_BINARY: &str = "grubdeck-worker";

// pkexec: 126 when the dialog is dismissed, 127 when not authorized.
const ELEVATION_DENIED_CODES: [i32; 2] = [126, 127];
const STDERR_GRACE: Duration = Duration::from_secs(2);

/// Runs the worker as a child process, elevated when configured.
#[derive(Debug, Clone)]
pub struct ProcessInstaller {
    worker: PathBuf,
    elevation: Option<String>,
    worker_config: Option<PathBuf>,
}

impl ProcessInstaller {
    /// Spawn `worker` directly, without elevation.
    pub fn new(worker: impl Into<PathBuf>) -> Self {
        Self {
            worker: worker.into(),
            elevation: None,
            worker_config: None,
        }
    }

    pub fn from_config(config: &ElevationConfig) -> Self {
        // An empty program name disables elevation.
        let elevation = if config.skip_when_root && is_root() {
            None
        } else {
            config.program.clone().filter(|program| !program.is_empty())
        };
        Self {
            worker: resolve_worker_path(config.worker_path.as_deref()),
            elevation,
            worker_config: config.worker_config.clone(),
        }
    }

    pub fn with_elevation(mut self, program: impl Into<String>) -> Self {
        self.elevation = Some(program.into());
        self
    }

    pub fn with_worker_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.worker_config = Some(path.into());
        self
    }

    pub fn worker(&self) -> &Path {
        &self.worker
    }

    pub fn elevation(&self) -> Option<&str> {
        self.elevation.as_deref()
    }

    fn command(&self, request: &InstallRequest) -> Result<Command, InstallError> {
        let mut command = match self.elevation.as_deref() {
            Some(program) => {
                let elevator = find_program(program).ok_or_else(|| {
                    InstallError::Invocation(format!(
                        "privilege elevation program '{program}' is not available"
                    ))
                })?;
                let mut command = Command::new(elevator);
                command.arg(absolute_worker(&self.worker));
                command
            }
            None => Command::new(&self.worker),
        };
        if let Some(config) = self.worker_config.as_ref() {
            command.arg("--config").arg(config);
        }
        command
            .arg(request.theme_name())
            .arg(request.source_location())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        Ok(command)
    }
}

impl Installer for ProcessInstaller {
    fn install(&self, request: InstallRequest) -> InstallHandle {
        let (sink, cancel, handle) = InstallHandle::channel();
        match self.command(&request) {
            Ok(command) => {
                info!(
                    theme = request.theme_name(),
                    source = request.source_location(),
                    elevated = self.elevation.is_some(),
                    "starting installer worker"
                );
                tokio::spawn(supervise(command, self.elevation.is_some(), sink, cancel));
            }
            Err(err) => {
                warn!(%err, "installer worker not started");
                sink.finish(InstallResult::generic_failure(err.to_string()));
            }
        }
        handle
    }
}

/// Explicit path, else a sibling of the running executable, else PATH lookup.
pub fn resolve_worker_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    let sibling = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(WORKER_BINARY)))
        .filter(|candidate| candidate.is_file());
    sibling.unwrap_or_else(|| PathBuf::from(WORKER_BINARY))
}

// Elevation helpers reset PATH, so hand them an absolute program path.
fn absolute_worker(worker: &Path) -> PathBuf {
    if worker.is_absolute() {
        return worker.to_path_buf();
    }
    if worker.components().count() == 1 {
        if let Some(found) = find_program(&worker.to_string_lossy()) {
            return found;
        }
    }
    env::current_dir()
        .map(|cwd| cwd.join(worker))
        .unwrap_or_else(|_| worker.to_path_buf())
}

struct RunState {
    tracker: ProgressTracker,
    done: Option<(Outcome, String)>,
    cancelled: bool,
    cancel_closed: bool,
}

async fn supervise(
    mut command: Command,
    elevated: bool,
    sink: EventSink,
    mut cancel: oneshot::Receiver<()>,
) {
    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(err) => {
            sink.finish(InstallResult::generic_failure(format!(
                "failed to start installer: {err}"
            )));
            return;
        }
    };

    let stderr_task = child.stderr.take().map(|stream| tokio::spawn(collect(stream)));
    let mut state = RunState {
        tracker: ProgressTracker::new(),
        done: None,
        cancelled: false,
        cancel_closed: false,
    };

    if let Some(stdout) = child.stdout.take() {
        relay_stdout(stdout, &sink, &mut state, &mut child, &mut cancel).await;
    }

    let status = loop {
        tokio::select! {
            status = child.wait() => break status,
            request = &mut cancel, if !state.cancel_closed => {
                state.cancel_closed = true;
                if request.is_ok() {
                    request_kill(&mut child, &mut state);
                }
            }
        }
    };

    let stderr = match stderr_task {
        Some(task) => match tokio::time::timeout(STDERR_GRACE, task).await {
            Ok(Ok(text)) => text,
            _ => String::new(),
        },
        None => String::new(),
    };

    let result = match status {
        Ok(status) => finish(status, elevated, state, stderr),
        Err(err) => InstallResult::generic_failure(format!("failed to wait for installer: {err}"))
            .with_diagnostics(stderr),
    };
    info!(outcome = %result.outcome, "installer worker finished");
    sink.finish(result);
}

async fn relay_stdout(
    stdout: ChildStdout,
    sink: &EventSink,
    state: &mut RunState,
    child: &mut Child,
    cancel: &mut oneshot::Receiver<()>,
) {
    let mut reader = BufReader::new(stdout);
    // Survives an interrupted read; partial lines stay buffered until complete.
    let mut line = Vec::new();
    loop {
        tokio::select! {
            read = reader.read_until(b'\n', &mut line) => match read {
                Ok(0) => return,
                Ok(_) => {
                    relay_line(&String::from_utf8_lossy(&line), sink, state);
                    line.clear();
                }
                Err(err) => {
                    warn!(%err, "failed to read installer output");
                    return;
                }
            },
            request = &mut *cancel, if !state.cancel_closed => {
                state.cancel_closed = true;
                // Grandchildren may keep the pipe open; stop reading once killed.
                if request.is_ok() && request_kill(child, state) {
                    return;
                }
            }
        }
    }
}

// Only a delivered kill counts as a cancellation; otherwise the run goes on
// and its exit status decides the outcome.
fn request_kill(child: &mut Child, state: &mut RunState) -> bool {
    match child.start_kill() {
        Ok(()) => {
            state.cancelled = true;
            true
        }
        Err(err) => {
            warn!(%err, "could not terminate installer worker; waiting for it to finish");
            false
        }
    }
}

fn relay_line(line: &str, sink: &EventSink, state: &mut RunState) {
    match WorkerMessage::decode(line) {
        Some(WorkerMessage::Progress {
            percentage,
            message,
        }) => match state.tracker.accept(percentage, message) {
            Some(event) => sink.progress(event),
            None => debug!(percentage, "dropping out-of-order progress"),
        },
        Some(WorkerMessage::Done { outcome, message }) => {
            state.done = Some((outcome, message));
        }
        None => debug!(line = %log_snippet(line), "ignoring unrecognized worker output"),
    }
}

async fn collect(stream: impl AsyncRead + Unpin) -> String {
    let mut bytes = Vec::new();
    let mut reader = BufReader::new(stream);
    if let Err(err) = reader.read_to_end(&mut bytes).await {
        debug!(%err, "stopped reading installer diagnostics");
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

fn finish(status: ExitStatus, elevated: bool, state: RunState, stderr: String) -> InstallResult {
    // A worker that exited on its own before the kill landed keeps its outcome.
    if state.cancelled && status.signal().is_some() {
        return InstallResult::generic_failure(
            "installation cancelled; files or boot configuration may already have been changed",
        )
        .with_diagnostics(stderr);
    }

    let code = status.code();
    if elevated && code.is_some_and(|code| ELEVATION_DENIED_CODES.contains(&code)) {
        return InstallResult::generic_failure(
            "authorization was denied or the privileged installer could not be started",
        )
        .with_diagnostics(stderr);
    }

    let outcome = Outcome::from_exit_code(code);
    // The exit status is authoritative; the worker's closing message only
    // supplies text when it agrees.
    let reported = state
        .done
        .filter(|(reported, _)| *reported == outcome)
        .map(|(_, message)| message)
        .filter(|message| !message.trim().is_empty());

    let result = match outcome {
        Outcome::Success => InstallResult::success(
            reported.unwrap_or_else(|| "Theme installed successfully.".to_string()),
        ),
        Outcome::RegenFailure => {
            InstallResult::regen_failure(reported.unwrap_or_else(|| last_line(&stderr)))
        }
        Outcome::GenericFailure => {
            let message = reported
                .or_else(|| Some(stderr.trim().to_string()).filter(|text| !text.is_empty()))
                .unwrap_or_else(|| format!("installer exited with {status}"));
            InstallResult::generic_failure(message)
        }
    };
    result.with_diagnostics(stderr)
}

fn last_line(text: &str) -> String {
    text.lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or_default()
        .trim()
        .to_string()
}
