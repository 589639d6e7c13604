//! Background job engine
//!
//! A [`Job`] is a blocking unit of work that runs on its own worker thread,
//! reports progress through its [`JobContext`] and returns exactly one
//! [`JobOutcome`]. The [`Dispatcher`] owns the workers.

use std::path::{Path, PathBuf};

use crate::domain::model::*;

pub mod detect;
pub mod dispatcher;
pub mod export;
pub mod progress;

pub use detect::DetectionJob;
pub use dispatcher::{
    DispatchEvent, Dispatcher, DispatcherConfig, JobObserver, JobToken, SlotState,
};
pub use export::ExportJob;
pub use progress::JobContext;

/// A cancellable, progress-emitting computation with a single terminal result
pub trait Job: Send + 'static {
    /// Single-flight is enforced per kind
    fn kind(&self) -> JobKind;

    /// Source media the job works on; recorded in the run log
    fn source(&self) -> &Path;

    /// Run to completion on the worker thread
    fn run(self: Box<Self>, ctx: &JobContext) -> JobOutcome;
}

/// Closure-backed job
pub struct FnJob<F> {
    kind: JobKind,
    source: PathBuf,
    body: F,
}

impl<F> FnJob<F>
where
    F: FnOnce(&JobContext) -> JobOutcome + Send + 'static,
{
    pub fn new(kind: JobKind, source: impl Into<PathBuf>, body: F) -> Self {
        Self {
            kind,
            source: source.into(),
            body,
        }
    }
}

impl<F> Job for FnJob<F>
where
    F: FnOnce(&JobContext) -> JobOutcome + Send + 'static,
{
    fn kind(&self) -> JobKind {
        self.kind
    }

    fn source(&self) -> &Path {
        &self.source
    }

    fn run(self: Box<Self>, ctx: &JobContext) -> JobOutcome {
        (self.body)(ctx)
    }
}
