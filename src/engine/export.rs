//! Clip export job

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::domain::errors::*;
use crate::domain::model::*;
use crate::domain::rules::ExportNaming;
use crate::engine::{Job, JobContext};
use crate::ports::*;

/// Cuts every selection into its own file, one transcode at a time
pub struct ExportJob {
    source: PathBuf,
    selections: Vec<Selection>,
    /// Size of the scene list the selections came from; fixes the name padding
    scene_count: usize,
    export_dir: PathBuf,
    transcoder: Arc<dyn TranscodePort>,
    preflight_done: bool,
}

impl ExportJob {
    pub fn new(
        source: impl Into<PathBuf>,
        selections: Vec<Selection>,
        scene_count: usize,
        export_dir: impl Into<PathBuf>,
        transcoder: Arc<dyn TranscodePort>,
    ) -> Self {
        Self {
            source: source.into(),
            selections,
            scene_count,
            export_dir: export_dir.into(),
            transcoder,
            preflight_done: false,
        }
    }

    /// Check the export directory and the transcoder once per submission
    ///
    /// A caller that runs this synchronously gets the precondition error before
    /// the job is submitted; otherwise the job runs it before the first item.
    pub fn preflight(&mut self) -> Result<(), DomainError> {
        if self.preflight_done {
            return Ok(());
        }
        ensure_writable_dir(&self.export_dir)?;
        self.transcoder.check_available()?;
        self.preflight_done = true;
        Ok(())
    }

    fn export_one(&self, selection: &Selection) -> ExportItem {
        let output = ExportNaming::output_path(
            &self.export_dir,
            &self.source,
            selection.ordinal(),
            self.scene_count,
        );
        debug!(
            "Exporting scene {} ({:.3}s to {:.3}s) to {}",
            selection.ordinal(),
            selection.start,
            selection.end,
            output.display()
        );

        let result = self
            .transcoder
            .transcode(&self.source, selection.start, selection.end, &output);

        if !result.ok {
            warn!("Scene {} failed: {}", selection.ordinal(), result.diagnostic);
        }

        ExportItem {
            item_id: selection.ordinal(),
            start: selection.start,
            end: selection.end,
            output,
            ok: result.ok,
            error: (!result.ok).then_some(result.diagnostic),
        }
    }
}

impl Job for ExportJob {
    fn kind(&self) -> JobKind {
        JobKind::Export
    }

    fn source(&self) -> &Path {
        &self.source
    }

    fn run(mut self: Box<Self>, ctx: &JobContext) -> JobOutcome {
        let started = Instant::now();
        let total = self.selections.len();

        if let Err(e) = self.preflight() {
            warn!("Export preflight failed: {}", e);
            return JobOutcome::failure(e);
        }

        info!(
            "Exporting {} clip(s) from {} to {}",
            total,
            file_label(&self.source),
            self.export_dir.display()
        );
        ctx.emit(ProgressEvent::start(Some(total)));

        let mut report = ExportReport::new(total, self.export_dir.clone());

        for (done, selection) in self.selections.iter().enumerate() {
            if ctx.is_interrupted() {
                info!("Export interrupted after {} of {} item(s)", done, total);
                report.elapsed = started.elapsed();
                return JobOutcome::Failure {
                    error: DomainError::Cancelled,
                    partial: Some(JobPayload::Export(report)),
                };
            }

            report.record(self.export_one(selection));
            ctx.emit(ProgressEvent::step(done + 1, total));
        }

        ctx.emit(ProgressEvent::end());
        report.elapsed = started.elapsed();
        info!(
            "Export finished: {} ok, {} failed in {:.3}s",
            report.ok,
            report.failed,
            report.elapsed.as_secs_f64()
        );

        JobOutcome::Success(JobPayload::Export(report))
    }
}

/// Create the directory if needed and prove a file can be written into it
pub fn ensure_writable_dir(dir: &Path) -> Result<(), DomainError> {
    fs::create_dir_all(dir).map_err(|e| {
        DomainError::PermissionDenied(format!(
            "Cannot create export folder {}: {}",
            dir.display(),
            e
        ))
    })?;

    tempfile::Builder::new()
        .prefix(".auraclip-write-test")
        .tempfile_in(dir)
        .map(drop)
        .map_err(|e| {
            DomainError::PermissionDenied(format!(
                "Export folder is not writable {}: {}",
                dir.display(),
                e
            ))
        })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;
    use crate::engine::dispatcher::JobToken;
    use crate::engine::progress::WorkerMessage;

    /// Records calls; succeeds by writing a byte unless told to fail
    struct ScriptedTranscoder {
        fail_ordinals: Vec<usize>,
        calls: Mutex<Vec<PathBuf>>,
        available: bool,
    }

    impl ScriptedTranscoder {
        fn new(fail_ordinals: Vec<usize>) -> Self {
            Self {
                fail_ordinals,
                calls: Mutex::new(Vec::new()),
                available: true,
            }
        }
    }

    impl TranscodePort for ScriptedTranscoder {
        fn check_available(&self) -> Result<(), DomainError> {
            if self.available {
                Ok(())
            } else {
                Err(DomainError::CollaboratorUnavailable("ffmpeg".to_string()))
            }
        }

        fn transcode(
            &self,
            _source: &Path,
            _start_s: f64,
            _end_s: f64,
            dest: &Path,
        ) -> TranscodeResult {
            let mut calls = self.calls.lock().unwrap();
            calls.push(dest.to_path_buf());
            if self.fail_ordinals.contains(&calls.len()) {
                TranscodeResult::failed("Invalid data found when processing input")
            } else {
                fs::write(dest, b"x").unwrap();
                TranscodeResult::success()
            }
        }
    }

    fn selections() -> Vec<Selection> {
        vec![
            Selection { index: 0, start: 0.0, end: 5.0 },
            Selection { index: 1, start: 5.0, end: 9.0 },
        ]
    }

    fn context() -> (JobContext, UnboundedReceiver<WorkerMessage>) {
        JobContext::detached(JobToken {
            kind: JobKind::Export,
            generation: 1,
        })
    }

    #[test]
    fn test_partial_failure_is_success_with_errors() {
        let dir = tempfile::tempdir().unwrap();
        let transcoder = Arc::new(ScriptedTranscoder::new(vec![2]));
        let job = ExportJob::new("/videos/talk.mp4", selections(), 3, dir.path(), transcoder);
        let (ctx, _receiver) = context();

        match Box::new(job).run(&ctx) {
            JobOutcome::Success(JobPayload::Export(report)) => {
                assert_eq!((report.requested, report.ok, report.failed), (2, 1, 1));
                assert_eq!(report.errors.len(), 1);
                assert_eq!(report.errors[0].ordinal, 2);
                assert_eq!(report.items[0].output, dir.path().join("talk_scene_01.mp4"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_step_after_every_item() {
        let dir = tempfile::tempdir().unwrap();
        let transcoder = Arc::new(ScriptedTranscoder::new(vec![1, 2]));
        let job = ExportJob::new("talk.mp4", selections(), 2, dir.path(), transcoder);
        let (ctx, mut receiver) = context();

        Box::new(job).run(&ctx);

        let steps: Vec<(Option<usize>, Option<usize>)> =
            std::iter::from_fn(|| receiver.try_recv().ok())
                .filter_map(|m| match m.body {
                    crate::engine::progress::WorkerBody::Progress(e)
                        if e.phase == ProgressPhase::Step =>
                    {
                        Some((e.done, e.total))
                    }
                    _ => None,
                })
                .collect();
        assert_eq!(steps, vec![(Some(1), Some(2)), (Some(2), Some(2))]);
    }

    #[test]
    fn test_unavailable_transcoder_fails_before_iteration() {
        let dir = tempfile::tempdir().unwrap();
        let mut transcoder = ScriptedTranscoder::new(Vec::new());
        transcoder.available = false;
        let transcoder = Arc::new(transcoder);
        let job = ExportJob::new("talk.mp4", selections(), 2, dir.path(), transcoder.clone());
        let (ctx, _receiver) = context();

        let outcome = Box::new(job).run(&ctx);

        assert!(matches!(
            outcome,
            JobOutcome::Failure {
                error: DomainError::CollaboratorUnavailable(_),
                partial: None
            }
        ));
        assert!(transcoder.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_interruption_stops_between_items() {
        let dir = tempfile::tempdir().unwrap();
        let transcoder = Arc::new(ScriptedTranscoder::new(Vec::new()));
        let job = ExportJob::new("talk.mp4", selections(), 2, dir.path(), transcoder.clone());
        let (ctx, _receiver) = context();
        ctx.interrupt();

        match Box::new(job).run(&ctx) {
            JobOutcome::Failure {
                error: DomainError::Cancelled,
                partial: Some(JobPayload::Export(report)),
            } => {
                assert_eq!(report.requested, 2);
                assert_eq!(report.ok + report.failed, 0);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(transcoder.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_ensure_writable_dir_creates_nested() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        ensure_writable_dir(&nested).unwrap();
        assert!(nested.is_dir());
        assert_eq!(fs::read_dir(&nested).unwrap().count(), 0);
    }

    #[test]
    fn test_ensure_writable_dir_rejects_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("taken");
        fs::write(&file, b"x").unwrap();
        assert!(matches!(
            ensure_writable_dir(&file),
            Err(DomainError::PermissionDenied(_))
        ));
    }
}
