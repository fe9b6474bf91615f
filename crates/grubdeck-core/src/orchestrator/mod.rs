//! Unprivileged side of an installation: start the worker and relay what it reports.
//!
//! An [`Installer`] hands back an [`InstallHandle`] right away. Progress arrives
//! on the handle while the privileged work is still running, followed by
//! exactly one [`InstallEvent::Finished`].

mod process;
#[cfg(any(test, feature = "scripted"))]
mod scripted;

use tokio::sync::{mpsc, oneshot};

use crate::model::{InstallRequest, InstallResult, ProgressEvent};

pub use process::{resolve_worker_path, ProcessInstaller, WORKER_BINARY};
#[cfg(any(test, feature = "scripted"))]
pub use scripted::ScriptedInstaller;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallEvent {
    Progress(ProgressEvent),
    Finished(InstallResult),
}

pub trait Installer {
    /// Start an installation. Implementations that spawn tasks must be called
    /// from within a tokio runtime.
    fn install(&self, request: InstallRequest) -> InstallHandle;
}

pub struct InstallHandle {
    events: mpsc::UnboundedReceiver<InstallEvent>,
    cancel: Option<oneshot::Sender<()>>,
}

/// Producer half held by an installer implementation.
pub(crate) struct EventSink {
    tx: mpsc::UnboundedSender<InstallEvent>,
}

impl EventSink {
    pub(crate) fn progress(&self, event: ProgressEvent) {
        let _ = self.tx.send(InstallEvent::Progress(event));
    }

    pub(crate) fn finish(self, result: InstallResult) {
        let _ = self.tx.send(InstallEvent::Finished(result));
    }
}

impl InstallHandle {
    pub(crate) fn channel() -> (EventSink, oneshot::Receiver<()>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let handle = Self {
            events: rx,
            cancel: Some(cancel_tx),
        };
        (EventSink { tx }, cancel_rx, handle)
    }

    /// Next event in emission order; `None` once the stream is exhausted.
    pub async fn next_event(&mut self) -> Option<InstallEvent> {
        self.events.recv().await
    }

    /// Terminate the worker. Changes it already applied stay in place.
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }

    /// Drain the stream, passing progress to `on_progress`, and return the result.
    pub async fn wait(mut self, mut on_progress: impl FnMut(&ProgressEvent)) -> InstallResult {
        while let Some(event) = self.next_event().await {
            match event {
                InstallEvent::Progress(progress) => on_progress(&progress),
                InstallEvent::Finished(result) => return result,
            }
        }
        InstallResult::generic_failure("installer stopped without reporting a result")
    }
}
