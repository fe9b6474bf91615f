//! Subprocess execution with captured output.
//!
//! Child stdout never reaches our own stdout, which carries the progress stream.

use std::collections::VecDeque;
use std::io::{self, BufRead, BufReader, Read};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;

use grubdeck_core::util::log_snippet;
use thiserror::Error;
use tracing::debug;

const STDERR_TAIL_LINES: usize = 20;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{label}: command not found")]
    NotFound { label: String },
    #[error("{label}: failed to start: {source}")]
    Spawn {
        label: String,
        #[source]
        source: io::Error,
    },
    #[error("{label}: {status}{}", render_stderr(.stderr))]
    Failed {
        label: String,
        status: ExitStatus,
        stderr: String,
    },
}

fn render_stderr(stderr: &str) -> String {
    if stderr.trim().is_empty() {
        String::new()
    } else {
        format!(": {}", stderr.trim())
    }
}

pub fn run_command(label: &str, mut command: Command) -> Result<(), CommandError> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                CommandError::NotFound {
                    label: label.to_string(),
                }
            } else {
                CommandError::Spawn {
                    label: label.to_string(),
                    source,
                }
            }
        })?;

    let stdout_handle = child.stdout.take().map(|stream| {
        let label = label.to_string();
        thread::spawn(move || read_stream(stream, &label, 0))
    });
    let stderr_handle = child.stderr.take().map(|stream| {
        let label = label.to_string();
        thread::spawn(move || read_stream(stream, &label, STDERR_TAIL_LINES))
    });

    let status = child.wait().map_err(|source| CommandError::Spawn {
        label: label.to_string(),
        source,
    })?;

    if let Some(handle) = stdout_handle {
        let _ = handle.join();
    }
    let stderr = stderr_handle
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();

    if status.success() {
        Ok(())
    } else {
        Err(CommandError::Failed {
            label: label.to_string(),
            status,
            stderr,
        })
    }
}

// Logs every line and keeps the last `keep` of them. Reads to EOF even past
// undecodable bytes so the child never sees a closed pipe.
fn read_stream(stream: impl Read, label: &str, keep: usize) -> String {
    let mut tail: VecDeque<String> = VecDeque::with_capacity(keep);
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                debug!(command = label, %err, "stopped reading subprocess output");
                break;
            }
        }
        let line = String::from_utf8_lossy(&buf).replace(['\r', '\n'], "");
        debug!(command = label, line = %log_snippet(&line), "subprocess output");
        if keep > 0 {
            if tail.len() == keep {
                tail.pop_front();
            }
            tail.push_back(line);
        }
    }
    Vec::from(tail).join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_and_failure_statuses() {
        let mut ok = Command::new("sh");
        ok.args(["-c", "echo out; echo err >&2"]);
        assert!(run_command("sh ok", ok).is_ok());

        let mut bad = Command::new("sh");
        bad.args(["-c", "echo first >&2; echo 'fatal: not a repo' >&2; exit 128"]);
        let err = run_command("sh bad", bad).unwrap_err();
        let rendered = err.to_string();
        assert!(rendered.starts_with("sh bad: exit status: 128"), "{rendered}");
        assert!(rendered.contains("first\nfatal: not a repo"));
    }

    #[test]
    fn undecodable_output_is_read_to_the_end() {
        let mut noisy = Command::new("sh");
        noisy.args([
            "-c",
            "printf 'Generating \\377 grub\\n'; i=0; while [ $i -lt 5000 ]; do echo line $i; i=$((i+1)); done",
        ]);
        assert!(run_command("sh noisy", noisy).is_ok());
    }

    #[test]
    fn stderr_keeps_only_the_last_lines() {
        let mut bad = Command::new("sh");
        bad.args([
            "-c",
            "printf 'bad \\377 byte\\n' >&2; for i in $(seq 1 30); do echo err $i >&2; done; exit 1",
        ]);
        let err = run_command("sh bad", bad).unwrap_err();
        let CommandError::Failed { stderr, .. } = err else {
            panic!("expected a failed command");
        };
        let lines: Vec<_> = stderr.lines().collect();
        assert_eq!(lines.len(), STDERR_TAIL_LINES);
        assert_eq!(lines.first(), Some(&"err 11"));
        assert_eq!(lines.last(), Some(&"err 30"));
    }

    #[test]
    fn missing_program_is_not_found() {
        let err = run_command(
            "grubdeck-no-such-tool",
            Command::new("grubdeck-no-such-tool"),
        )
        .unwrap_err();
        assert!(matches!(err, CommandError::NotFound { .. }));
    }
}
