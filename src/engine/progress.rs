//! Worker-side progress channel and interruption flag

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::domain::model::*;
use crate::engine::dispatcher::JobToken;

/// Message relayed from a worker thread to the caller
#[derive(Debug)]
pub struct WorkerMessage {
    pub token: JobToken,
    pub body: WorkerBody,
}

#[derive(Debug)]
pub enum WorkerBody {
    Progress(ProgressEvent),
    Finished(JobOutcome),
}

/// Handle given to a running job
///
/// Progress and the terminal outcome share one channel from one thread, so
/// every progress event reaches the caller before the result.
#[derive(Debug, Clone)]
pub struct JobContext {
    token: JobToken,
    sender: UnboundedSender<WorkerMessage>,
    interrupted: Arc<AtomicBool>,
}

impl JobContext {
    pub(crate) fn new(
        token: JobToken,
        sender: UnboundedSender<WorkerMessage>,
        interrupted: Arc<AtomicBool>,
    ) -> Self {
        Self {
            token,
            sender,
            interrupted,
        }
    }

    /// Context wired to a fresh channel, for driving a job without a dispatcher
    pub fn detached(token: JobToken) -> (Self, UnboundedReceiver<WorkerMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(token, sender, Arc::new(AtomicBool::new(false))), receiver)
    }

    pub fn token(&self) -> JobToken {
        self.token
    }

    /// Emit and continue; a closed receiver only means nobody is listening
    pub fn emit(&self, event: ProgressEvent) {
        let _ = self.sender.send(WorkerMessage {
            token: self.token,
            body: WorkerBody::Progress(event),
        });
    }

    /// Whether cancellation was requested; checked between work items
    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// Request cooperative cancellation
    pub fn interrupt(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
    }

    pub(crate) fn finish(&self, outcome: JobOutcome) {
        let _ = self.sender.send(WorkerMessage {
            token: self.token,
            body: WorkerBody::Finished(outcome),
        });
    }
}
