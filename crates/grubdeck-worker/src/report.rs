//! Progress stream writer for the caller on the other side of stdout.

use std::io::{self, Write};

use grubdeck_core::{Outcome, WorkerMessage};
use tracing::debug;

pub struct ProgressReporter<W: Write> {
    out: W,
    last: u8,
}

impl ProgressReporter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> ProgressReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out, last: 0 }
    }

    /// Emit a checkpoint; percentages never move backwards.
    pub fn progress(&mut self, percentage: u8, message: impl Into<String>) {
        let percentage = percentage.clamp(self.last, 100);
        self.last = percentage;
        self.emit(&WorkerMessage::progress(percentage, message));
    }

    pub fn done(&mut self, outcome: Outcome, message: impl Into<String>) {
        self.emit(&WorkerMessage::done(outcome, message));
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, message: &WorkerMessage) {
        // A vanished reader must not abort the privileged work.
        if let Err(err) = message.write_line(&mut self.out) {
            debug!(%err, "progress stream unavailable");
        }
    }
}
