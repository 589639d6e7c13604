// Ports - Interface definitions (contracts) for external collaborators
//
// Every port is called from a job's worker thread and blocks for the full
// duration of the collaborator call, so the traits are synchronous.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::domain::errors::*;
use crate::domain::model::*;

/// Which of the two detector API shapes was found at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorApi {
    /// Dedicated scene-change filter reporting seconds
    Scdet,
    /// Scene-score select filter reporting PTS ticks
    SelectShowinfo,
}

impl fmt::Display for DetectorApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectorApi::Scdet => f.write_str("scdet"),
            DetectorApi::SelectShowinfo => f.write_str("select+showinfo"),
        }
    }
}

/// Detector parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorConfig {
    /// 0-100 content scale; higher means fewer boundaries
    pub threshold: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

/// Opened detector input
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorHandle {
    pub path: PathBuf,
}

/// Port for the scene-boundary detector
///
/// One strategy object is selected at startup; the rest of the system only
/// sees this interface.
pub trait SceneDetectorPort: Send + Sync {
    /// API shape implemented by this strategy
    fn api(&self) -> DetectorApi;

    /// Open a source for detection
    fn open(&self, path: &Path) -> Result<DetectorHandle, DomainError>;

    /// Run detection and return `(start, end)` pairs in native timecodes
    fn run(
        &self,
        handle: &DetectorHandle,
        config: &DetectorConfig,
    ) -> Result<Vec<(Timecode, Timecode)>, DomainError>;

    /// Normalize a native timecode into seconds
    fn extract_seconds(&self, timecode: &Timecode) -> f64;
}

/// Port for media metadata probing
pub trait ProbePort: Send + Sync {
    /// Probe media; returns the all-zero `MediaInfo` on any failure
    fn probe(&self, path: &Path) -> MediaInfo;
}

/// Result of a single transcode invocation
#[derive(Debug, Clone, PartialEq)]
pub struct TranscodeResult {
    pub ok: bool,
    /// Trimmed stderr or spawn error; empty when nothing was reported
    pub diagnostic: String,
}

impl TranscodeResult {
    pub fn success() -> Self {
        Self {
            ok: true,
            diagnostic: String::new(),
        }
    }

    pub fn failed(diagnostic: impl Into<String>) -> Self {
        Self {
            ok: false,
            diagnostic: diagnostic.into(),
        }
    }
}

/// Port for the external transcoding process
pub trait TranscodePort: Send + Sync {
    /// Verify the executable runs at all
    fn check_available(&self) -> Result<(), DomainError>;

    /// Cut `[start_s, end_s]` of `source` into `dest`, overwriting it
    fn transcode(&self, source: &Path, start_s: f64, end_s: f64, dest: &Path) -> TranscodeResult;
}

/// Port for the durable run log
pub trait RunLogPort: Send + Sync {
    /// Append one entry; never fails from the caller's point of view
    fn log(&self, entry: &RunLogEntry);
}
