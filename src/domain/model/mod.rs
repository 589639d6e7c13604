// Domain models - Core types and data structures

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::errors::DomainError;

/// Ranges at or below this length (seconds) are never exported
pub const MIN_SEGMENT_LENGTH: f64 = 0.05;

/// Default detector threshold on the 0-100 content scale
pub const DEFAULT_THRESHOLD: f64 = 27.0;

/// A detected time segment of the source media, in seconds
///
/// Only constructed through [`Scene::new`], so `0 <= start <= end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Scene {
    start: f64,
    end: f64,
}

impl Scene {
    /// Create a scene, rejecting negative or inverted ranges
    pub fn new(start: f64, end: f64) -> Result<Self, DomainError> {
        if !start.is_finite() || !end.is_finite() {
            return Err(DomainError::BadArgs(format!(
                "Scene bounds must be finite: {} -> {}",
                start, end
            )));
        }
        if start < 0.0 {
            return Err(DomainError::BadArgs(format!(
                "Scene start cannot be negative: {}",
                start
            )));
        }
        if end < start {
            return Err(DomainError::BadArgs(format!(
                "Scene end ({}) precedes start ({})",
                end, start
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Human-readable list row, numbered from one
    pub fn label(&self, ordinal: usize) -> String {
        format!("Scene {}: {:.2}s → {:.2}s", ordinal, self.start, self.end)
    }
}

impl<'de> Deserialize<'de> for Scene {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            start: f64,
            end: f64,
        }

        let raw = Raw::deserialize(deserializer)?;
        Scene::new(raw.start, raw.end).map_err(serde::de::Error::custom)
    }
}

/// A validated, clamped export range derived from a checked scene
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    /// Zero-based position of the scene in the detection result
    pub index: usize,
    pub start: f64,
    pub end: f64,
}

impl Selection {
    /// One-based scene number used in file names and messages
    pub fn ordinal(&self) -> usize {
        self.index + 1
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Lightweight media metadata; all zeros when probing failed
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MediaInfo {
    pub duration: f64,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
}

impl MediaInfo {
    /// True for the all-zero value returned on probe failure
    pub fn is_unknown(&self) -> bool {
        *self == Self::default()
    }
}

impl fmt::Display for MediaInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Duration: {:.2}s\nFPS: {:.2}\nResolution: {} x {}",
            self.duration, self.fps, self.width, self.height
        )
    }
}

/// Timebase for timestamp calculations - rational seconds per tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timebase {
    pub num: i64,
    pub den: i64,
}

impl Timebase {
    /// Create a new timebase
    pub fn new(num: i64, den: i64) -> Result<Self, DomainError> {
        if den == 0 {
            return Err(DomainError::BadArgs(
                "Timebase denominator cannot be zero".to_string(),
            ));
        }
        Ok(Self { num, den })
    }

    /// Parse `num/den`
    pub fn parse(text: &str) -> Result<Self, DomainError> {
        let (num, den) = text
            .trim()
            .split_once('/')
            .ok_or_else(|| DomainError::BadArgs(format!("Invalid timebase: {}", text)))?;
        let num = num
            .trim()
            .parse::<i64>()
            .map_err(|_| DomainError::BadArgs(format!("Invalid timebase numerator: {}", text)))?;
        let den = den
            .trim()
            .parse::<i64>()
            .map_err(|_| DomainError::BadArgs(format!("Invalid timebase denominator: {}", text)))?;
        Self::new(num, den)
    }

    /// Convert to floating point seconds
    pub fn to_seconds(&self) -> f64 {
        self.num as f64 / self.den as f64
    }

    /// Convert PTS to seconds
    pub fn pts_to_seconds(&self, pts: i64) -> f64 {
        pts as f64 * self.to_seconds()
    }

    /// Convert seconds to PTS
    pub fn seconds_to_pts(&self, seconds: f64) -> i64 {
        (seconds / self.to_seconds()).round() as i64
    }
}

/// A detector's native timestamp, before normalization to seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Timecode {
    /// Already expressed in seconds
    Seconds(f64),
    /// Presentation timestamp ticks in a stream timebase
    Pts { pts: i64, time_base: Timebase },
}

/// The two kinds of background job; single-flight is enforced per kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Detect,
    Export,
}

impl JobKind {
    pub const ALL: [JobKind; 2] = [JobKind::Detect, JobKind::Export];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Detect => "detect",
            JobKind::Export => "export",
        }
    }

    /// Operation name recorded in the run log
    pub fn operation(&self) -> &'static str {
        match self {
            JobKind::Detect => "detect_scenes",
            JobKind::Export => "export_clips",
        }
    }

    /// Parse job kind from string
    pub fn parse(kind: &str) -> Result<Self, DomainError> {
        match kind.trim().to_lowercase().as_str() {
            "detect" => Ok(JobKind::Detect),
            "export" => Ok(JobKind::Export),
            other => Err(DomainError::BadArgs(format!(
                "Invalid job kind: {}. Valid kinds: detect, export",
                other
            ))),
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressPhase {
    Start,
    Step,
    End,
}

/// Informational progress emitted by a running job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub phase: ProgressPhase,
    pub done: Option<usize>,
    pub total: Option<usize>,
}

impl ProgressEvent {
    pub fn start(total: Option<usize>) -> Self {
        Self {
            phase: ProgressPhase::Start,
            done: total.map(|_| 0),
            total,
        }
    }

    pub fn step(done: usize, total: usize) -> Self {
        Self {
            phase: ProgressPhase::Step,
            done: Some(done),
            total: Some(total),
        }
    }

    pub fn end() -> Self {
        Self {
            phase: ProgressPhase::End,
            done: None,
            total: None,
        }
    }

    /// Completion percentage when both counters are known
    pub fn percent(&self) -> Option<f64> {
        match (self.done, self.total) {
            (Some(done), Some(total)) if total > 0 => {
                Some((done as f64 / total as f64 * 100.0).min(100.0))
            }
            _ => None,
        }
    }
}

/// Result of a detection run
#[derive(Debug, Clone, PartialEq)]
pub struct DetectReport {
    pub scenes: Vec<Scene>,
    pub threshold: f64,
    pub elapsed: Duration,
}

/// Outcome of one transcode invocation within an export
#[derive(Debug, Clone, PartialEq)]
pub struct ExportItem {
    /// Scene ordinal the item was cut from
    pub item_id: usize,
    pub start: f64,
    pub end: f64,
    pub output: PathBuf,
    pub ok: bool,
    pub error: Option<String>,
}

/// Context kept for a failed item so the first failure can be reported
#[derive(Debug, Clone, PartialEq)]
pub struct ItemError {
    pub ordinal: usize,
    pub start: f64,
    pub end: f64,
    pub diagnostic: String,
}

impl fmt::Display for ItemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let diagnostic = if self.diagnostic.is_empty() {
            "(no stderr)"
        } else {
            self.diagnostic.as_str()
        };
        write!(
            f,
            "Scene {} {:.2}s→{:.2}s: {}",
            self.ordinal, self.start, self.end, diagnostic
        )
    }
}

/// Aggregated result of an export batch; partial success is not an error
#[derive(Debug, Clone, PartialEq)]
pub struct ExportReport {
    pub requested: usize,
    pub ok: usize,
    pub failed: usize,
    pub errors: Vec<ItemError>,
    pub items: Vec<ExportItem>,
    pub export_dir: PathBuf,
    pub elapsed: Duration,
}

impl ExportReport {
    pub fn new(requested: usize, export_dir: PathBuf) -> Self {
        Self {
            requested,
            ok: 0,
            failed: 0,
            errors: Vec::new(),
            items: Vec::with_capacity(requested),
            export_dir,
            elapsed: Duration::ZERO,
        }
    }

    /// Fold one item into the counters
    pub fn record(&mut self, item: ExportItem) {
        if item.ok {
            self.ok += 1;
        } else {
            self.failed += 1;
            self.errors.push(ItemError {
                ordinal: item.item_id,
                start: item.start,
                end: item.end,
                diagnostic: item.error.clone().unwrap_or_default(),
            });
        }
        self.items.push(item);
    }

    pub fn first_error(&self) -> Option<&ItemError> {
        self.errors.first()
    }
}

/// Success payload of either job kind
#[derive(Debug, Clone, PartialEq)]
pub enum JobPayload {
    Detect(DetectReport),
    Export(ExportReport),
}

impl JobPayload {
    pub fn kind(&self) -> JobKind {
        match self {
            JobPayload::Detect(_) => JobKind::Detect,
            JobPayload::Export(_) => JobKind::Export,
        }
    }

    pub fn elapsed(&self) -> Duration {
        match self {
            JobPayload::Detect(report) => report.elapsed,
            JobPayload::Export(report) => report.elapsed,
        }
    }
}

/// The single terminal result of a job
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Success(JobPayload),
    Failure {
        error: DomainError,
        partial: Option<JobPayload>,
    },
}

impl JobOutcome {
    pub fn failure(error: DomainError) -> Self {
        JobOutcome::Failure {
            error,
            partial: None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Success(_))
    }

    /// The success payload, or the partial payload of a failure
    pub fn payload(&self) -> Option<&JobPayload> {
        match self {
            JobOutcome::Success(payload) => Some(payload),
            JobOutcome::Failure { partial, .. } => partial.as_ref(),
        }
    }

    pub fn error(&self) -> Option<&DomainError> {
        match self {
            JobOutcome::Success(_) => None,
            JobOutcome::Failure { error, .. } => Some(error),
        }
    }
}

/// Terminal status recorded in the run log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failure,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Failure => "failure",
        }
    }
}

/// Kind-specific metrics of a run log entry
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RunMetrics {
    Detect {
        scene_count: Option<usize>,
        threshold: Option<f64>,
        elapsed_s: f64,
    },
    Export {
        requested: Option<usize>,
        ok: Option<usize>,
        failed: Option<usize>,
        elapsed_s: f64,
        export_dir: Option<String>,
    },
}

/// One append-only audit record per completed job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunLogEntry {
    pub timestamp: String,
    pub kind: JobKind,
    pub file: String,
    pub operation: String,
    pub status: RunStatus,
    pub error: Option<String>,
    pub watchdog_fired: bool,
    #[serde(flatten)]
    pub metrics: RunMetrics,
}

impl RunLogEntry {
    /// Build the entry for a delivered outcome
    ///
    /// `elapsed` is used only when the outcome carries no payload of its own.
    pub fn from_outcome(
        kind: JobKind,
        source: &Path,
        outcome: &JobOutcome,
        elapsed: Duration,
        watchdog_fired: bool,
    ) -> Self {
        let payload = outcome.payload();
        let elapsed_s = round_millis(payload.map(JobPayload::elapsed).unwrap_or(elapsed));

        let metrics = match (kind, payload) {
            (JobKind::Detect, Some(JobPayload::Detect(report))) => RunMetrics::Detect {
                scene_count: Some(report.scenes.len()),
                threshold: Some(report.threshold),
                elapsed_s,
            },
            (JobKind::Detect, _) => RunMetrics::Detect {
                scene_count: None,
                threshold: None,
                elapsed_s,
            },
            (JobKind::Export, Some(JobPayload::Export(report))) => RunMetrics::Export {
                requested: Some(report.requested),
                ok: Some(report.ok),
                failed: Some(report.failed),
                elapsed_s,
                export_dir: Some(report.export_dir.to_string_lossy().to_string()),
            },
            (JobKind::Export, _) => RunMetrics::Export {
                requested: None,
                ok: None,
                failed: None,
                elapsed_s,
                export_dir: None,
            },
        };

        let (status, error) = match outcome {
            JobOutcome::Success(_) => (RunStatus::Success, None),
            JobOutcome::Failure { error, .. } => (RunStatus::Failure, Some(error.to_string())),
        };

        Self {
            timestamp: chrono::Local::now().to_rfc3339(),
            kind,
            file: file_label(source),
            operation: kind.operation().to_string(),
            status,
            error,
            watchdog_fired,
            metrics,
        }
    }

    /// Column names and values in the order used by the tabular store
    pub fn columns(&self) -> Vec<(&'static str, String)> {
        let mut columns = vec![
            ("timestamp", self.timestamp.clone()),
            ("kind", self.kind.to_string()),
            ("file", self.file.clone()),
            ("operation", self.operation.clone()),
            ("status", self.status.as_str().to_string()),
            ("error", self.error.clone().unwrap_or_default()),
            ("watchdog_fired", self.watchdog_fired.to_string()),
        ];

        match &self.metrics {
            RunMetrics::Detect {
                scene_count,
                threshold,
                elapsed_s,
            } => {
                columns.push(("scene_count", optional(scene_count)));
                columns.push(("threshold", optional(threshold)));
                columns.push(("elapsed_s", format!("{:.3}", elapsed_s)));
            }
            RunMetrics::Export {
                requested,
                ok,
                failed,
                elapsed_s,
                export_dir,
            } => {
                columns.push(("requested", optional(requested)));
                columns.push(("ok", optional(ok)));
                columns.push(("failed", optional(failed)));
                columns.push(("elapsed_s", format!("{:.3}", elapsed_s)));
                columns.push(("export_dir", export_dir.clone().unwrap_or_default()));
            }
        }

        columns
    }
}

fn optional<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map(ToString::to_string).unwrap_or_default()
}

fn round_millis(duration: Duration) -> f64 {
    (duration.as_secs_f64() * 1000.0).round() / 1000.0
}

/// File name shown in logs and messages
pub fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}
