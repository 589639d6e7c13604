//! Single-flight job dispatcher
//!
//! The dispatcher lives on the caller's task. It owns at most one worker
//! thread per [`JobKind`], relays worker messages to the caller in emission
//! order, arms a watchdog per job and writes one run log entry per delivered
//! outcome.
//!
//! The watchdog only restores caller responsiveness: the worker keeps running
//! and its eventual outcome is still delivered and logged. While a stalled
//! worker is alive its kind reports not busy but still rejects submissions, so
//! a second worker of the same kind is never started.

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::domain::errors::DomainError;
use crate::domain::model::*;
use crate::engine::progress::{JobContext, WorkerBody, WorkerMessage};
use crate::engine::{FnJob, Job};
use crate::error::DispatchError;
use crate::ports::RunLogPort;

/// How often shutdown re-checks whether workers have exited
const SHUTDOWN_POLL: Duration = Duration::from_millis(20);

/// Dispatcher tuning
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispatcherConfig {
    /// Time after submission before caller-visible busy state is released
    pub watchdog: Duration,
    /// How long shutdown waits for interrupted workers
    pub shutdown_grace: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            watchdog: Duration::from_secs(60),
            shutdown_grace: Duration::from_secs(3),
        }
    }
}

/// Opaque handle for one submission
///
/// Operations with a token whose job has already finished are no-ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobToken {
    pub kind: JobKind,
    pub generation: u64,
}

impl fmt::Display for JobToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.generation)
    }
}

/// Per-kind lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Idle,
    Running,
    /// Watchdog fired; the worker has not reported yet
    Stalled,
}

/// Event handed to the caller by [`Dispatcher::next_event`]
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchEvent {
    Progress {
        token: JobToken,
        event: ProgressEvent,
    },
    /// Terminal outcome; the slot is already idle and the run logged
    Finished {
        token: JobToken,
        outcome: JobOutcome,
        watchdog_fired: bool,
    },
    /// Liveness only; a `Finished` for the same token may still follow
    WatchdogFired { token: JobToken },
}

impl DispatchEvent {
    pub fn token(&self) -> JobToken {
        match self {
            DispatchEvent::Progress { token, .. }
            | DispatchEvent::Finished { token, .. }
            | DispatchEvent::WatchdogFired { token } => *token,
        }
    }
}

/// Caller-side handlers; all run on the caller's task
pub trait JobObserver {
    fn on_progress(&mut self, token: JobToken, event: ProgressEvent);

    fn on_result(&mut self, token: JobToken, outcome: &JobOutcome, watchdog_fired: bool);

    fn on_watchdog(&mut self, token: JobToken);
}

struct ActiveJob {
    token: JobToken,
    source: PathBuf,
    started: Instant,
    deadline: Instant,
    watchdog_fired: bool,
    ctx: JobContext,
    handle: Option<JoinHandle<()>>,
}

impl ActiveJob {
    fn state(&self) -> SlotState {
        if self.watchdog_fired {
            SlotState::Stalled
        } else {
            SlotState::Running
        }
    }
}

pub struct Dispatcher {
    config: DispatcherConfig,
    run_log: Arc<dyn RunLogPort>,
    sender: UnboundedSender<WorkerMessage>,
    receiver: UnboundedReceiver<WorkerMessage>,
    slots: HashMap<JobKind, ActiveJob>,
    generation: u64,
    shut_down: bool,
}

impl Dispatcher {
    pub fn new(config: DispatcherConfig, run_log: Arc<dyn RunLogPort>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            config,
            run_log,
            sender,
            receiver,
            slots: HashMap::new(),
            generation: 0,
            shut_down: false,
        }
    }

    pub fn config(&self) -> DispatcherConfig {
        self.config
    }

    pub fn state(&self, kind: JobKind) -> SlotState {
        self.slots
            .get(&kind)
            .map(ActiveJob::state)
            .unwrap_or(SlotState::Idle)
    }

    /// Caller-visible busy flag; cleared when the watchdog fires
    pub fn is_busy(&self, kind: JobKind) -> bool {
        self.state(kind) == SlotState::Running
    }

    /// Whether any worker has yet to report
    pub fn has_active(&self) -> bool {
        !self.slots.is_empty()
    }

    /// Token of the job currently occupying `kind`'s slot
    pub fn active_token(&self, kind: JobKind) -> Option<JobToken> {
        self.slots.get(&kind).map(|job| job.token)
    }

    /// Start `job` on a fresh worker thread, or reject without queuing
    pub fn submit<J: Job>(&mut self, job: J) -> Result<JobToken, DispatchError> {
        self.submit_boxed(Box::new(job))
    }

    /// Wrap a closure as a job and submit it
    pub fn submit_fn<F>(
        &mut self,
        kind: JobKind,
        source: impl Into<PathBuf>,
        body: F,
    ) -> Result<JobToken, DispatchError>
    where
        F: FnOnce(&JobContext) -> JobOutcome + Send + 'static,
    {
        self.submit(FnJob::new(kind, source, body))
    }

    pub fn submit_boxed(&mut self, job: Box<dyn Job>) -> Result<JobToken, DispatchError> {
        let kind = job.kind();
        if self.shut_down {
            return Err(DispatchError::ShutDown);
        }
        if self.slots.contains_key(&kind) {
            debug!("Rejected {} submission: slot is {:?}", kind, self.state(kind));
            return Err(DispatchError::AlreadyRunning { kind });
        }

        self.generation += 1;
        let token = JobToken {
            kind,
            generation: self.generation,
        };
        let source = job.source().to_path_buf();
        let ctx = JobContext::new(token, self.sender.clone(), Arc::new(AtomicBool::new(false)));

        let worker_ctx = ctx.clone();
        let handle = thread::Builder::new()
            .name(format!("{}-worker-{}", kind, token.generation))
            .spawn(move || run_worker(job, worker_ctx))
            .map_err(|e| DispatchError::SpawnFailed {
                kind,
                message: e.to_string(),
            })?;

        let started = Instant::now();
        info!("Started {} job {} on {}", kind, token, file_label(&source));
        self.slots.insert(
            kind,
            ActiveJob {
                token,
                source,
                started,
                deadline: started + self.config.watchdog,
                watchdog_fired: false,
                ctx,
                handle: Some(handle),
            },
        );

        Ok(token)
    }

    /// Ask the job to stop at its next checkpoint; false for stale tokens
    pub fn cancel(&self, token: JobToken) -> bool {
        match self.slots.get(&token.kind) {
            Some(job) if job.token == token => {
                info!("Cancellation requested for {}", token);
                job.ctx.interrupt();
                true
            }
            _ => {
                debug!("Ignoring cancel for stale token {}", token);
                false
            }
        }
    }

    /// Wait for the next event; `None` once no job is active
    pub async fn next_event(&mut self) -> Option<DispatchEvent> {
        loop {
            if self.slots.is_empty() {
                return None;
            }

            let next_deadline = self
                .slots
                .values()
                .filter(|job| !job.watchdog_fired)
                .map(|job| job.deadline)
                .min();

            let message = match next_deadline {
                Some(deadline) => {
                    tokio::select! {
                        message = self.receiver.recv() => message,
                        _ = tokio::time::sleep_until(deadline) => {
                            if let Some(event) = self.fire_watchdogs() {
                                return Some(event);
                            }
                            continue;
                        }
                    }
                }
                None => self.receiver.recv().await,
            };

            // The dispatcher holds a sender, so the channel never closes
            let Some(message) = message else {
                return None;
            };

            if let Some(event) = self.accept(message).await {
                return Some(event);
            }
        }
    }

    /// Deliver one event to `observer`; false once no job is active
    pub async fn dispatch<O>(&mut self, observer: &mut O) -> bool
    where
        O: JobObserver + ?Sized,
    {
        match self.next_event().await {
            Some(DispatchEvent::Progress { token, event }) => observer.on_progress(token, event),
            Some(DispatchEvent::Finished {
                token,
                outcome,
                watchdog_fired,
            }) => observer.on_result(token, &outcome, watchdog_fired),
            Some(DispatchEvent::WatchdogFired { token }) => observer.on_watchdog(token),
            None => return false,
        }
        true
    }

    /// Pump events into `observer` until every job has reported
    pub async fn run_until_idle<O>(&mut self, observer: &mut O)
    where
        O: JobObserver + ?Sized,
    {
        while self.dispatch(observer).await {}
    }

    /// Interrupt every worker, wait up to the grace period, then forget them
    ///
    /// Outcomes that arrive within the grace period are still logged. Calling
    /// this more than once is harmless.
    pub async fn shutdown(&mut self) {
        if self.shut_down && self.slots.is_empty() {
            return;
        }
        self.shut_down = true;

        if self.slots.is_empty() {
            debug!("Dispatcher shut down with no active jobs");
            return;
        }

        info!("Shutting down {} active job(s)", self.slots.len());
        for job in self.slots.values() {
            job.ctx.interrupt();
        }

        let deadline = Instant::now() + self.config.shutdown_grace;
        while Instant::now() < deadline && !self.all_workers_finished() {
            tokio::time::sleep(SHUTDOWN_POLL).await;
        }

        // Log whatever finished while we waited
        while let Ok(message) = self.receiver.try_recv() {
            if let WorkerBody::Finished(outcome) = message.body {
                if let Some(job) = self.take_slot(message.token) {
                    self.log_run(&job, &outcome);
                    join_worker(job);
                }
            }
        }

        for (kind, mut job) in self.slots.drain() {
            match job.handle.take() {
                Some(handle) if handle.is_finished() => {
                    if handle.join().is_err() {
                        warn!("{} worker ended with a panic", kind);
                    }
                }
                Some(_) => warn!(
                    "Abandoning {} worker {} after {:?} grace period",
                    kind, job.token, self.config.shutdown_grace
                ),
                None => {}
            }
        }
    }

    fn all_workers_finished(&self) -> bool {
        self.slots.values().all(|job| {
            job.handle
                .as_ref()
                .map(JoinHandle::is_finished)
                .unwrap_or(true)
        })
    }

    fn fire_watchdogs(&mut self) -> Option<DispatchEvent> {
        let now = Instant::now();
        let job = self
            .slots
            .values_mut()
            .filter(|job| !job.watchdog_fired && job.deadline <= now)
            .min_by_key(|job| job.deadline)?;

        job.watchdog_fired = true;
        warn!(
            "Watchdog fired for {} after {:?}; the worker keeps running",
            job.token, self.config.watchdog
        );
        Some(DispatchEvent::WatchdogFired { token: job.token })
    }

    async fn accept(&mut self, message: WorkerMessage) -> Option<DispatchEvent> {
        let current = self.active_token(message.token.kind);
        if current != Some(message.token) {
            debug!("Dropping message from stale job {}", message.token);
            return None;
        }

        match message.body {
            WorkerBody::Progress(event) => Some(DispatchEvent::Progress {
                token: message.token,
                event,
            }),
            WorkerBody::Finished(outcome) => {
                let mut job = self.take_slot(message.token)?;
                let watchdog_fired = job.watchdog_fired;
                self.log_run(&job, &outcome);

                if let Some(handle) = job.handle.take() {
                    match tokio::task::spawn_blocking(move || handle.join()).await {
                        Ok(Ok(())) => {}
                        Ok(Err(_)) => warn!("{} worker ended with a panic", message.token),
                        Err(e) => warn!("Could not join {} worker: {}", message.token, e),
                    }
                }

                Some(DispatchEvent::Finished {
                    token: message.token,
                    outcome,
                    watchdog_fired,
                })
            }
        }
    }

    fn take_slot(&mut self, token: JobToken) -> Option<ActiveJob> {
        match self.slots.get(&token.kind) {
            Some(job) if job.token == token => self.slots.remove(&token.kind),
            _ => None,
        }
    }

    fn log_run(&self, job: &ActiveJob, outcome: &JobOutcome) {
        match outcome {
            JobOutcome::Success(_) => info!("Job {} succeeded", job.token),
            JobOutcome::Failure { error, .. } if error.is_precondition() => {
                warn!("Job {} could not start: {}", job.token, error)
            }
            JobOutcome::Failure { error, .. } => error!("Job {} failed: {}", job.token, error),
        }

        let entry = RunLogEntry::from_outcome(
            job.token.kind,
            &job.source,
            outcome,
            job.started.elapsed(),
            job.watchdog_fired,
        );
        self.run_log.log(&entry);
    }
}

fn join_worker(mut job: ActiveJob) {
    if let Some(handle) = job.handle.take() {
        if handle.is_finished() && handle.join().is_err() {
            warn!("{} worker ended with a panic", job.token);
        }
    }
}

/// Worker thread body: run the job and always send exactly one outcome
fn run_worker(job: Box<dyn Job>, ctx: JobContext) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| job.run(&ctx))).unwrap_or_else(|_| {
        error!("{} worker panicked", ctx.token());
        JobOutcome::failure(DomainError::InternalError("worker panicked".to_string()))
    });
    ctx.finish(outcome);
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct MemoryLog {
        entries: Mutex<Vec<RunLogEntry>>,
    }

    impl RunLogPort for MemoryLog {
        fn log(&self, entry: &RunLogEntry) {
            self.entries.lock().unwrap().push(entry.clone());
        }
    }

    fn dispatcher(watchdog: Duration) -> (Dispatcher, Arc<MemoryLog>) {
        let log = Arc::new(MemoryLog::default());
        let config = DispatcherConfig {
            watchdog,
            shutdown_grace: Duration::from_millis(200),
        };
        (Dispatcher::new(config, log.clone()), log)
    }

    fn detect_success() -> JobOutcome {
        JobOutcome::Success(JobPayload::Detect(DetectReport {
            scenes: Vec::new(),
            threshold: 27.0,
            elapsed: Duration::from_millis(5),
        }))
    }

    #[tokio::test]
    async fn test_idle_dispatcher_has_no_events() {
        let (mut dispatcher, _log) = dispatcher(Duration::from_secs(60));
        assert!(!dispatcher.is_busy(JobKind::Detect));
        assert_eq!(dispatcher.next_event().await, None);
    }

    #[tokio::test]
    async fn test_panicking_worker_reports_failure() {
        let (mut dispatcher, log) = dispatcher(Duration::from_secs(60));
        let token = dispatcher
            .submit_fn(JobKind::Detect, "clip.mp4", |_ctx| panic!("boom"))
            .unwrap();

        match dispatcher.next_event().await {
            Some(DispatchEvent::Finished { token: t, outcome, .. }) => {
                assert_eq!(t, token);
                assert_eq!(
                    outcome.error(),
                    Some(&DomainError::InternalError("worker panicked".to_string()))
                );
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(dispatcher.state(JobKind::Detect), SlotState::Idle);
        assert_eq!(log.entries.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_kinds_are_independent() {
        let (mut dispatcher, log) = dispatcher(Duration::from_secs(60));
        dispatcher
            .submit_fn(JobKind::Detect, "a.mp4", |_| detect_success())
            .unwrap();
        dispatcher
            .submit_fn(JobKind::Export, "a.mp4", |_| {
                JobOutcome::failure(DomainError::Cancelled)
            })
            .unwrap();

        let mut finished = Vec::new();
        while let Some(event) = dispatcher.next_event().await {
            if let DispatchEvent::Finished { token, .. } = event {
                finished.push(token.kind);
            }
        }
        finished.sort_by_key(|kind| kind.as_str());
        assert_eq!(finished, vec![JobKind::Detect, JobKind::Export]);
        assert_eq!(log.entries.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_cancel_with_stale_token_is_noop() {
        let (mut dispatcher, _log) = dispatcher(Duration::from_secs(60));
        let token = dispatcher
            .submit_fn(JobKind::Detect, "a.mp4", |_| detect_success())
            .unwrap();
        while dispatcher.next_event().await.is_some() {}

        assert!(!dispatcher.cancel(token));
    }

    #[tokio::test]
    async fn test_cancel_reaches_worker() {
        let (mut dispatcher, _log) = dispatcher(Duration::from_secs(60));
        let token = dispatcher
            .submit_fn(JobKind::Export, "a.mp4", |ctx| {
                while !ctx.is_interrupted() {
                    thread::sleep(Duration::from_millis(5));
                }
                JobOutcome::failure(DomainError::Cancelled)
            })
            .unwrap();

        assert!(dispatcher.cancel(token));
        match dispatcher.next_event().await {
            Some(DispatchEvent::Finished { outcome, .. }) => {
                assert_eq!(outcome.error(), Some(&DomainError::Cancelled));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_is_rejected() {
        let (mut dispatcher, _log) = dispatcher(Duration::from_secs(60));
        dispatcher.shutdown().await;
        dispatcher.shutdown().await;

        let result = dispatcher.submit_fn(JobKind::Detect, "a.mp4", |_| detect_success());
        assert_eq!(result, Err(DispatchError::ShutDown));
    }
}
