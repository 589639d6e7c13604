//! Caller-side session state
//!
//! The session owns everything a user sees: the loaded source, the scene
//! list, which scenes are checked, trigger enablement and the status line.
//! It is only mutated from the caller's task, either by a request method or
//! by a [`JobObserver`] handler.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::errors::*;
use crate::domain::model::*;
use crate::domain::rules::SelectionValidator;
use crate::engine::{DetectionJob, Dispatcher, ExportJob, JobObserver, JobToken};
use crate::error::AuraResult;
use crate::ports::*;

/// External collaborators available to a session
#[derive(Clone)]
pub struct Collaborators {
    pub prober: Arc<dyn ProbePort>,
    pub detector: Result<Arc<dyn SceneDetectorPort>, DomainError>,
    pub transcoder: Result<Arc<dyn TranscodePort>, DomainError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A message meant for the user, as opposed to the log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub severity: Severity,
    pub title: String,
    pub text: String,
}

impl Notice {
    fn new(severity: Severity, title: &str, text: impl Into<String>) -> Self {
        Self {
            severity,
            title: title.to_string(),
            text: text.into(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.title, self.text)
    }
}

pub struct Session {
    collaborators: Collaborators,
    export_dir: PathBuf,
    source: Option<PathBuf>,
    media: MediaInfo,
    scenes: Vec<Scene>,
    /// Bumped whenever the scene list is replaced or invalidated
    scene_generation: u64,
    checked: BTreeSet<usize>,
    exported: BTreeSet<usize>,
    triggers: HashMap<JobKind, bool>,
    /// Bumped on every `load`; results from an earlier source are ignored
    source_generation: u64,
    /// Awaited submissions, tagged with the source generation they were made for
    pending: HashMap<JobKind, (JobToken, u64)>,
    progress: Option<ProgressEvent>,
    status: String,
    notices: Vec<Notice>,
    last_detect: Option<DetectReport>,
    last_export: Option<ExportReport>,
}

impl Session {
    pub fn new(collaborators: Collaborators, export_dir: impl Into<PathBuf>) -> Self {
        Self {
            collaborators,
            export_dir: export_dir.into(),
            source: None,
            media: MediaInfo::default(),
            scenes: Vec::new(),
            scene_generation: 0,
            checked: BTreeSet::new(),
            exported: BTreeSet::new(),
            triggers: JobKind::ALL.iter().map(|kind| (*kind, false)).collect(),
            source_generation: 0,
            pending: HashMap::new(),
            progress: None,
            status: "Import a video to begin.".to_string(),
            notices: Vec::new(),
            last_detect: None,
            last_export: None,
        }
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn media(&self) -> MediaInfo {
        self.media
    }

    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    pub fn scene_generation(&self) -> u64 {
        self.scene_generation
    }

    pub fn export_dir(&self) -> &Path {
        &self.export_dir
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn progress(&self) -> Option<ProgressEvent> {
        self.progress
    }

    pub fn is_trigger_enabled(&self, kind: JobKind) -> bool {
        self.triggers.get(&kind).copied().unwrap_or(false)
    }

    /// Checked scene ordinals, ascending
    pub fn checked_ordinals(&self) -> Vec<usize> {
        self.checked.iter().map(|index| index + 1).collect()
    }

    pub fn last_detect(&self) -> Option<&DetectReport> {
        self.last_detect.as_ref()
    }

    pub fn last_export(&self) -> Option<&ExportReport> {
        self.last_export.as_ref()
    }

    /// Drain notices raised since the last call
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Scene list rows; exported scenes are relabelled
    pub fn scene_labels(&self) -> Vec<String> {
        if self.scenes.is_empty() && self.last_detect.is_some() {
            return vec!["No scenes detected.".to_string()];
        }
        self.scenes
            .iter()
            .enumerate()
            .map(|(index, scene)| {
                let label = scene.label(index + 1);
                if self.exported.contains(&index) {
                    format!("Exported {}", label)
                } else {
                    label
                }
            })
            .collect()
    }

    /// Load a source; clears the scene list and every selection
    pub fn load(&mut self, path: &Path) -> Result<MediaInfo, DomainError> {
        if !path.is_file() {
            self.notice(Severity::Error, "Media Error", "File does not exist.");
            return Err(DomainError::FileNotFound(path.display().to_string()));
        }

        let media = self.collaborators.prober.probe(path);
        if media.is_unknown() {
            warn!("No media info for {}", path.display());
        }

        self.source = Some(path.to_path_buf());
        self.source_generation += 1;
        self.media = media;
        self.replace_scenes(Vec::new());
        self.last_detect = None;
        self.last_export = None;
        for kind in JobKind::ALL {
            self.set_trigger(kind, !self.pending.contains_key(&kind));
        }
        self.status = format!("Imported: {}", file_label(path));
        info!("Loaded {} ({})", path.display(), media.to_string().replace('\n', ", "));
        Ok(media)
    }

    /// Replace the scene list wholesale, invalidating selections
    pub fn replace_scenes(&mut self, scenes: Vec<Scene>) {
        self.scenes = scenes;
        self.scene_generation += 1;
        self.checked.clear();
        self.exported.clear();
    }

    /// Check scenes by one-based ordinal
    pub fn check(&mut self, ordinals: &[usize]) -> Result<(), DomainError> {
        if let Some(bad) = ordinals
            .iter()
            .find(|&&ordinal| ordinal == 0 || ordinal > self.scenes.len())
        {
            return Err(DomainError::StaleSelection(format!(
                "scene {} does not exist in the current list of {}",
                bad,
                self.scenes.len()
            )));
        }
        self.checked.extend(ordinals.iter().map(|ordinal| ordinal - 1));
        Ok(())
    }

    pub fn check_all(&mut self) {
        self.checked = (0..self.scenes.len()).collect();
    }

    /// Validate preconditions and submit a detection job
    pub fn request_detect(
        &mut self,
        dispatcher: &mut Dispatcher,
        threshold: f64,
    ) -> AuraResult<JobToken> {
        let Some(source) = self.source.clone() else {
            self.notice(Severity::Info, "No File", "Please import a video first.");
            return Err(DomainError::NoSource.into());
        };
        let detector = match self.collaborators.detector.clone() {
            Ok(detector) => detector,
            Err(e) => {
                self.notice(Severity::Error, "Detector Unavailable", e.to_string());
                return Err(e.into());
            }
        };

        self.set_trigger(JobKind::Detect, false);
        let token = match dispatcher.submit(DetectionJob::new(source, threshold, detector)) {
            Ok(token) => token,
            Err(e) => {
                self.set_trigger(JobKind::Detect, !dispatcher.is_busy(JobKind::Detect));
                return Err(e.into());
            }
        };

        // Any ordinal checked so far refers to the list being replaced
        self.checked.clear();
        self.scene_generation += 1;
        self.pending
            .insert(JobKind::Detect, (token, self.source_generation));
        self.status = "Detecting scenes... please wait.".to_string();
        Ok(token)
    }

    /// Validate preconditions and submit an export job for the checked scenes
    pub fn request_export(&mut self, dispatcher: &mut Dispatcher) -> AuraResult<JobToken> {
        let job = self.prepare_export()?;

        self.set_trigger(JobKind::Export, false);
        let token = match dispatcher.submit(job) {
            Ok(token) => token,
            Err(e) => {
                self.set_trigger(JobKind::Export, !dispatcher.is_busy(JobKind::Export));
                return Err(e.into());
            }
        };

        self.pending
            .insert(JobKind::Export, (token, self.source_generation));
        self.status = "Exporting clips... please wait.".to_string();
        Ok(token)
    }

    fn prepare_export(&mut self) -> Result<ExportJob, DomainError> {
        let result = self.build_export();
        if let Err(e) = &result {
            let (severity, text) = match e {
                DomainError::NoSource => {
                    (Severity::Info, "Please import a video first.".to_string())
                }
                DomainError::NothingToExport(msg) => (Severity::Info, msg.clone()),
                DomainError::PermissionDenied(_) => (
                    Severity::Error,
                    format!("No write permission to:\n{}", self.export_dir.display()),
                ),
                other => (Severity::Error, other.to_string()),
            };
            self.notice(severity, "Export Clips", text);
        }
        result
    }

    fn build_export(&self) -> Result<ExportJob, DomainError> {
        let source = self.source.clone().ok_or(DomainError::NoSource)?;
        if self.scenes.is_empty() {
            return Err(DomainError::NothingToExport(
                "No detected scenes found. Run detection first.".to_string(),
            ));
        }
        let transcoder = self.collaborators.transcoder.clone()?;
        if self.checked.is_empty() {
            return Err(DomainError::NothingToExport(
                "No scenes selected to export.".to_string(),
            ));
        }

        // Re-probe: the file may have changed since it was loaded
        let duration = self.collaborators.prober.probe(&source).duration;
        if !(duration > MIN_SEGMENT_LENGTH) {
            return Err(DomainError::InvalidDuration(duration));
        }

        let selections =
            SelectionValidator::validate(&self.scenes, self.checked.iter().copied(), duration);
        if selections.is_empty() {
            return Err(DomainError::NothingToExport(
                "Nothing to export after clamping times.".to_string(),
            ));
        }
        debug!("{} of {} checked scenes survive validation", selections.len(), self.checked.len());

        let mut job = ExportJob::new(
            source,
            selections,
            self.scenes.len(),
            self.export_dir.clone(),
            transcoder,
        );
        job.preflight()?;
        Ok(job)
    }

    fn set_trigger(&mut self, kind: JobKind, enabled: bool) {
        self.triggers.insert(kind, enabled && self.source.is_some());
    }

    fn notice(&mut self, severity: Severity, title: &str, text: impl Into<String>) {
        self.notices.push(Notice::new(severity, title, text));
    }

    /// Whether the result belongs to the submission this session is waiting on
    /// and to the source that is loaded now
    fn take_pending(&mut self, token: JobToken) -> bool {
        match self.pending.get(&token.kind) {
            Some(&(pending, generation)) if pending == token => {
                self.pending.remove(&token.kind);
                generation == self.source_generation
            }
            _ => false,
        }
    }

    fn on_detect_result(&mut self, outcome: &JobOutcome) {
        match outcome {
            JobOutcome::Success(JobPayload::Detect(report)) => {
                self.replace_scenes(report.scenes.clone());
                self.last_detect = Some(report.clone());
                self.status = if report.scenes.is_empty() {
                    "No scenes found.".to_string()
                } else {
                    format!("Detected {} scenes.", report.scenes.len())
                };
            }
            JobOutcome::Failure { error, .. } => {
                self.status = "Scene detection failed.".to_string();
                self.notice(
                    Severity::Error,
                    "Detection Error",
                    format!("Failed to detect scenes:\n{}", error),
                );
            }
            JobOutcome::Success(other) => {
                warn!("Unexpected {} payload for detection", other.kind());
            }
        }
    }

    fn on_export_result(&mut self, outcome: &JobOutcome) {
        match outcome {
            JobOutcome::Success(JobPayload::Export(report)) => {
                self.exported.extend(
                    report
                        .items
                        .iter()
                        .filter(|item| item.ok)
                        .map(|item| item.item_id - 1),
                );
                let (severity, title, text) = export_summary(report);
                self.status = export_status(report);
                self.notice(severity, title, text);
                self.last_export = Some(report.clone());
            }
            JobOutcome::Failure {
                error: DomainError::Cancelled,
                partial,
            } => {
                let done = match partial {
                    Some(JobPayload::Export(report)) => report.ok,
                    _ => 0,
                };
                self.status = format!("Export cancelled after {} clip(s).", done);
            }
            JobOutcome::Failure { error, .. } => {
                self.status = "Export failed.".to_string();
                self.notice(Severity::Error, "Export Error", error.to_string());
            }
            JobOutcome::Success(other) => {
                warn!("Unexpected {} payload for export", other.kind());
            }
        }
    }
}

impl JobObserver for Session {
    fn on_progress(&mut self, token: JobToken, event: ProgressEvent) {
        self.progress = Some(event);
        if let (JobKind::Export, Some(done), Some(total)) = (token.kind, event.done, event.total) {
            if event.phase == ProgressPhase::Step {
                self.status = format!("Exporting clips... {}/{}", done, total);
            }
        }
    }

    fn on_result(&mut self, token: JobToken, outcome: &JobOutcome, watchdog_fired: bool) {
        self.progress = None;
        let current = self.take_pending(token);
        self.set_trigger(token.kind, true);

        if !current {
            debug!("Ignoring result of superseded job {}", token);
            return;
        }
        if watchdog_fired {
            info!("Late result for {} delivered after the watchdog", token);
        }

        match token.kind {
            JobKind::Detect => self.on_detect_result(outcome),
            JobKind::Export => self.on_export_result(outcome),
        }
    }

    fn on_watchdog(&mut self, token: JobToken) {
        self.progress = None;
        self.set_trigger(token.kind, true);
        self.status = format!(
            "The {} job is taking longer than expected; it keeps running in the background.",
            token.kind
        );
        self.notice(Severity::Warning, "Still Working", self.status.clone());
    }
}

/// Status line after an export batch
pub fn export_status(report: &ExportReport) -> String {
    match (report.ok, report.failed) {
        (0, _) => "Export failed.".to_string(),
        (ok, 0) => format!("Exported {} clip(s).", ok),
        (ok, failed) => format!("Exported {} clip(s), {} failed.", ok, failed),
    }
}

/// User-facing summary of an export batch
pub fn export_summary(report: &ExportReport) -> (Severity, &'static str, String) {
    let dir = report.export_dir.display();
    match report.first_error() {
        None => (
            Severity::Info,
            "Export Complete",
            format!("Exported {} scene(s) to:\n{}", report.ok, dir),
        ),
        Some(first) if report.ok > 0 => (
            Severity::Warning,
            "Export Partially Complete",
            format!(
                "Exported {} clip(s), {} failed.\nFirst failure (Scene {} {:.2}s→{:.2}s):\n{}",
                report.ok,
                report.failed,
                first.ordinal,
                first.start,
                first.end,
                stderr_or_placeholder(&first.diagnostic)
            ),
        ),
        Some(first) => (
            Severity::Error,
            "Export Error",
            format!(
                "No clips were exported.\n\nffmpeg stderr (first failure):\n{}\n\n\
                 Check write perms for:\n{}",
                stderr_or_placeholder(&first.diagnostic),
                dir
            ),
        ),
    }
}

fn stderr_or_placeholder(diagnostic: &str) -> &str {
    if diagnostic.is_empty() {
        "(no stderr)"
    } else {
        diagnostic
    }
}
