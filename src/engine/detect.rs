//! Scene detection job

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info};

use crate::domain::errors::*;
use crate::domain::model::*;
use crate::engine::{Job, JobContext};
use crate::ports::*;

/// Runs the selected detector strategy once over the source
pub struct DetectionJob {
    source: PathBuf,
    config: DetectorConfig,
    detector: Arc<dyn SceneDetectorPort>,
}

impl DetectionJob {
    pub fn new(
        source: impl Into<PathBuf>,
        threshold: f64,
        detector: Arc<dyn SceneDetectorPort>,
    ) -> Self {
        Self {
            source: source.into(),
            config: DetectorConfig { threshold },
            detector,
        }
    }

    fn detect(&self) -> Result<Vec<Scene>, DomainError> {
        let handle = self.detector.open(&self.source)?;
        let ranges = self.detector.run(&handle, &self.config)?;

        ranges
            .iter()
            .map(|(start, end)| {
                let start = self.detector.extract_seconds(start);
                let end = self.detector.extract_seconds(end);
                Scene::new(start, end).map_err(|e| {
                    DomainError::DetectionFailed(format!("detector returned a bad range: {}", e))
                })
            })
            .collect()
    }
}

impl Job for DetectionJob {
    fn kind(&self) -> JobKind {
        JobKind::Detect
    }

    fn source(&self) -> &Path {
        &self.source
    }

    fn run(self: Box<Self>, ctx: &JobContext) -> JobOutcome {
        info!(
            "Detecting scenes in {} (threshold {}, {})",
            file_label(&self.source),
            self.config.threshold,
            self.detector.api()
        );
        ctx.emit(ProgressEvent::start(None));

        let started = Instant::now();
        let result = self.detect();
        let elapsed = started.elapsed();

        ctx.emit(ProgressEvent::end());

        match result {
            Ok(scenes) => {
                debug!("Detected {} scenes in {:.3}s", scenes.len(), elapsed.as_secs_f64());
                JobOutcome::Success(JobPayload::Detect(DetectReport {
                    scenes,
                    threshold: self.config.threshold,
                    elapsed,
                }))
            }
            Err(e) => {
                error!("Detection failed for {}: {}", self.source.display(), e);
                // Every detector error is terminal for the run
                let e = match e {
                    DomainError::DetectionFailed(_) => e,
                    other => DomainError::DetectionFailed(other.to_string()),
                };
                JobOutcome::failure(e)
            }
        }
    }
}
