//! Installer fake that replays a fixed event sequence.

use crate::model::{InstallRequest, InstallResult, ProgressEvent};

use super::{InstallHandle, Installer};

#[derive(Debug, Clone)]
pub struct ScriptedInstaller {
    progress: Vec<ProgressEvent>,
    result: InstallResult,
}

impl ScriptedInstaller {
    pub fn new(progress: Vec<ProgressEvent>, result: InstallResult) -> Self {
        Self { progress, result }
    }

    /// Replays the checkpoints of a healthy run.
    pub fn succeeding() -> Self {
        let progress = [
            (5, "Starting installation..."),
            (40, "Repository cloned successfully."),
            (70, "Theme files copied."),
            (90, "GRUB configuration updated."),
            (100, "Installation complete."),
        ]
        .into_iter()
        .filter_map(|(percentage, message)| ProgressEvent::new(percentage, message))
        .collect();
        Self::new(progress, InstallResult::success("Theme installed successfully."))
    }
}

impl Installer for ScriptedInstaller {
    fn install(&self, _request: InstallRequest) -> InstallHandle {
        let (sink, _cancel, handle) = InstallHandle::channel();
        for event in &self.progress {
            sink.progress(event.clone());
        }
        sink.finish(self.result.clone());
        handle
    }
}
