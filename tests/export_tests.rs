//! Integration tests for clip export against a scripted transcoder

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use auraclip::domain::model::*;
use auraclip::domain::rules::{ExportNaming, SelectionValidator};
use auraclip::engine::{Dispatcher, DispatcherConfig, ExportJob, JobObserver, JobToken};
use auraclip::output::RunLogger;
use auraclip::ports::{TranscodePort, TranscodeResult};
use auraclip::DomainError;
use tempfile::TempDir;

// Test utilities

/// Writes a small file per call, failing the listed 1-based calls
struct ScriptedTranscoder {
    fail_calls: Vec<usize>,
    calls: Mutex<Vec<(f64, f64)>>,
}

impl ScriptedTranscoder {
    fn failing(fail_calls: Vec<usize>) -> Arc<Self> {
        Arc::new(Self {
            fail_calls,
            calls: Mutex::new(Vec::new()),
        })
    }
}

impl TranscodePort for ScriptedTranscoder {
    fn check_available(&self) -> Result<(), DomainError> {
        Ok(())
    }

    fn transcode(&self, _source: &Path, start_s: f64, end_s: f64, dest: &Path) -> TranscodeResult {
        let mut calls = self.calls.lock().unwrap();
        calls.push((start_s, end_s));
        if self.fail_calls.contains(&calls.len()) {
            TranscodeResult::failed("Invalid data found when processing input")
        } else {
            fs::write(dest, b"clip").unwrap();
            TranscodeResult::success()
        }
    }
}

#[derive(Default)]
struct LastOutcome(Option<JobOutcome>);

impl JobObserver for LastOutcome {
    fn on_progress(&mut self, _token: JobToken, _event: ProgressEvent) {}

    fn on_result(&mut self, _token: JobToken, outcome: &JobOutcome, _watchdog_fired: bool) {
        self.0 = Some(outcome.clone());
    }

    fn on_watchdog(&mut self, _token: JobToken) {}
}

fn scenes() -> Vec<Scene> {
    vec![
        Scene::new(0.0, 4.0).unwrap(),
        Scene::new(4.0, 9.5).unwrap(),
        Scene::new(9.5, 15.0).unwrap(),
    ]
}

async fn run_export(
    dir: &TempDir,
    transcoder: Arc<ScriptedTranscoder>,
    checked: Vec<usize>,
) -> (ExportReport, Arc<RunLogger>) {
    let scenes = scenes();
    let selections = SelectionValidator::validate(&scenes, checked, 12.0);
    let log = Arc::new(RunLogger::new(dir.path().join("logs")));
    let mut dispatcher = Dispatcher::new(DispatcherConfig::default(), log.clone());

    let job = ExportJob::new(
        dir.path().join("lecture.mp4"),
        selections,
        scenes.len(),
        dir.path().join("clips"),
        transcoder,
    );
    dispatcher.submit(job).unwrap();

    let mut observer = LastOutcome::default();
    dispatcher.run_until_idle(&mut observer).await;

    match observer.0 {
        Some(JobOutcome::Success(JobPayload::Export(report))) => (report, log),
        other => panic!("unexpected outcome: {:?}", other),
    }
}

// Partial and total failure

#[tokio::test]
async fn test_second_item_failure_is_partial_success() {
    let dir = TempDir::new().unwrap();
    let transcoder = ScriptedTranscoder::failing(vec![2]);

    let (report, log) = run_export(&dir, transcoder.clone(), vec![0, 1, 2]).await;

    assert_eq!((report.requested, report.ok, report.failed), (3, 2, 1));
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].ordinal, 2);
    assert!(report.errors[0].diagnostic.contains("Invalid data"));

    // Third scene is clamped to the probed duration
    let calls = transcoder.calls.lock().unwrap();
    assert_eq!(calls.as_slice(), &[(0.0, 4.0), (4.0, 9.5), (9.5, 12.0)]);

    let records = log.history(JobKind::Export);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["status"], "success");
    assert_eq!(records[0]["ok"], 2);
    assert_eq!(records[0]["failed"], 1);
}

#[tokio::test]
async fn test_all_items_failing_reports_nothing_exported() {
    let dir = TempDir::new().unwrap();
    let transcoder = ScriptedTranscoder::failing(vec![1, 2]);

    let (report, _log) = run_export(&dir, transcoder, vec![1, 0]).await;

    assert_eq!(report.ok, 0);
    assert_eq!(report.failed, report.requested);
    assert!(report.items.iter().all(|item| !item.ok));
    for item in &report.items {
        assert!(!item.output.exists());
    }
}

// Naming

#[tokio::test]
async fn test_output_names_follow_scene_ordinals() {
    let dir = TempDir::new().unwrap();
    let transcoder = ScriptedTranscoder::failing(Vec::new());

    let (report, _log) = run_export(&dir, transcoder, vec![2, 0]).await;

    let names: Vec<String> = report
        .items
        .iter()
        .map(|item| item.output.file_name().unwrap().to_string_lossy().to_string())
        .collect();
    assert_eq!(names, vec!["lecture_scene_01.mp4", "lecture_scene_03.mp4"]);
    assert_eq!(
        report.items[1].output,
        ExportNaming::output_path(&dir.path().join("clips"), Path::new("lecture.mp4"), 3, 3)
    );
    assert!(report.items.iter().all(|item| item.output.exists()));
}

#[tokio::test]
async fn test_unwritable_export_dir_fails_before_any_item() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("clips");
    fs::write(&blocker, b"a file, not a folder").unwrap();

    let transcoder = ScriptedTranscoder::failing(Vec::new());
    let mut job = ExportJob::new(
        dir.path().join("lecture.mp4"),
        SelectionValidator::validate(&scenes(), vec![0], 12.0),
        3,
        &blocker,
        transcoder.clone(),
    );

    assert!(matches!(job.preflight(), Err(DomainError::PermissionDenied(_))));
    assert!(transcoder.calls.lock().unwrap().is_empty());
}
