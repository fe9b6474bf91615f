//! Line framing for worker-to-caller messages.
//!
//! The worker writes one JSON object per line on stdout. The decoder also
//! understands the older `PROGRESS:<percentage>:<message>` lines. Anything it
//! cannot make sense of decodes to `None` so a stray line never breaks the stream.

use std::io::{self, Write};

use serde::{Deserialize, Serialize};

use crate::model::{Outcome, ProgressEvent};

const LEGACY_TAG: &str = "PROGRESS";
const LEGACY_DELIMITER: char = ':';

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkerMessage {
    Progress { percentage: u8, message: String },
    Done { outcome: Outcome, message: String },
}

impl WorkerMessage {
    pub fn progress(percentage: u8, message: impl Into<String>) -> Self {
        Self::Progress {
            percentage: percentage.min(100),
            message: message.into(),
        }
    }

    pub fn done(outcome: Outcome, message: impl Into<String>) -> Self {
        Self::Done {
            outcome,
            message: message.into(),
        }
    }

    /// Write the message as a single line and flush.
    pub fn write_line(&self, out: &mut impl Write) -> io::Result<()> {
        serde_json::to_writer(&mut *out, self)?;
        out.write_all(b"\n")?;
        out.flush()
    }

    pub fn decode(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let message = if line.trim_start().starts_with('{') {
            serde_json::from_str::<WorkerMessage>(line).ok()?
        } else {
            decode_legacy(line)?
        };
        message.is_well_formed().then_some(message)
    }

    fn is_well_formed(&self) -> bool {
        match self {
            WorkerMessage::Progress {
                percentage,
                message,
            } => *percentage <= 100 && !message.trim().is_empty(),
            WorkerMessage::Done { .. } => true,
        }
    }
}

fn decode_legacy(line: &str) -> Option<WorkerMessage> {
    let mut parts = line.splitn(3, LEGACY_DELIMITER);
    if parts.next()? != LEGACY_TAG {
        return None;
    }
    let percentage = parts.next()?.trim().parse::<u8>().ok()?;
    let message = parts.next()?;
    Some(WorkerMessage::Progress {
        percentage,
        message: message.to_string(),
    })
}

/// Keeps the forwarded progress sequence non-decreasing.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    last: Option<u8>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the event to forward, or `None` when it would move progress backwards.
    pub fn accept(&mut self, percentage: u8, message: String) -> Option<ProgressEvent> {
        if self.last.is_some_and(|last| percentage < last) {
            return None;
        }
        let event = ProgressEvent::new(percentage, message)?;
        self.last = Some(percentage);
        Some(event)
    }

    pub fn last(&self) -> Option<u8> {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_lines_decode() {
        let mut buf = Vec::new();
        WorkerMessage::progress(40, "Repository cloned: ok")
            .write_line(&mut buf)
            .unwrap();
        WorkerMessage::done(Outcome::RegenFailure, "update-grub missing")
            .write_line(&mut buf)
            .unwrap();
        let text = String::from_utf8(buf).unwrap();
        let decoded: Vec<_> = text.lines().filter_map(WorkerMessage::decode).collect();
        assert_eq!(
            decoded,
            vec![
                WorkerMessage::progress(40, "Repository cloned: ok"),
                WorkerMessage::done(Outcome::RegenFailure, "update-grub missing"),
            ]
        );
        assert!(text.contains("\"kind\":\"done\""));
        assert!(text.contains("\"outcome\":\"regen_failure\""));
    }

    #[test]
    fn legacy_lines_split_on_first_two_delimiters_only() {
        assert_eq!(
            WorkerMessage::decode("PROGRESS:95:Applying changes: update-grub:1\n"),
            Some(WorkerMessage::progress(95, "Applying changes: update-grub:1"))
        );
    }

    #[test]
    fn malformed_lines_are_dropped() {
        for line in [
            "",
            "Cloning into '/tmp/x'...",
            "PROGRESS:notanumber:msg",
            "PROGRESS:50",
            "PROGRESS:150:too far",
            "PROGRESS:-5:negative",
            "PROGRESS:10:",
            "PROGRES:10:typo",
            "{\"kind\":\"progress\",\"percentage\":\"ten\",\"message\":\"x\"}",
            "{\"kind\":\"progress\",\"percentage\":300,\"message\":\"x\"}",
            "{\"kind\":\"progress\",\"percentage\":10,\"message\":\"\"}",
            "{\"kind\":\"shout\",\"message\":\"x\"}",
            "{not json",
        ] {
            assert_eq!(WorkerMessage::decode(line), None, "{line:?} decoded");
        }
    }

    #[test]
    fn tracker_rejects_regressions_and_malformed_events_without_moving() {
        let mut tracker = ProgressTracker::new();
        assert!(tracker.accept(5, "start".into()).is_some());
        assert!(tracker.accept(40, "cloned".into()).is_some());
        assert!(tracker.accept(10, "late".into()).is_none());
        assert!(tracker.accept(70, " ".into()).is_none());
        assert_eq!(tracker.last(), Some(40));
        assert!(tracker.accept(40, "again".into()).is_some());
        assert_eq!(tracker.accept(100, "done".into()).unwrap().percentage, 100);
    }
}
