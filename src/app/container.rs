use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use crate::adapters::toml_config::AppConfig;
use crate::adapters::{
    resolve_executable, select_detector, FfmpegTranscodeAdapter, FfprobeAdapter,
};
use crate::app::session::{Collaborators, Session};
use crate::engine::{Dispatcher, DispatcherConfig};
use crate::output::RunLogger;
use crate::ports::{ProbePort, RunLogPort, TranscodePort};

pub trait AppContainer {
    fn config(&self) -> &AppConfig;
    fn run_log(&self) -> Arc<RunLogger>;
    fn session(&self) -> Session;
    fn dispatcher(&self) -> Dispatcher;
}

/// Wires the ffmpeg/ffprobe adapters and the run logger from configuration
pub struct DefaultAppContainer {
    config: AppConfig,
    collaborators: Collaborators,
    run_log: Arc<RunLogger>,
}

impl DefaultAppContainer {
    /// Resolve executables and probe the detector API once for the process
    ///
    /// Missing collaborators are not fatal here; the session reports them as
    /// precondition errors when a job needs them.
    pub fn new(config: AppConfig) -> Self {
        let ffmpeg = resolve_executable(config.ffmpeg.as_deref(), "ffmpeg");

        let (detector, transcoder) = match ffmpeg {
            Ok(ffmpeg) => {
                info!("Using ffmpeg at {}", ffmpeg.display());
                let transcoder: Arc<dyn TranscodePort> = Arc::new(FfmpegTranscodeAdapter::new(
                    ffmpeg.clone(),
                    config.video_codec.clone(),
                    config.audio_codec.clone(),
                ));
                (select_detector(&ffmpeg), Ok(transcoder))
            }
            Err(e) => {
                warn!("{}", e);
                (Err(e.clone()), Err(e))
            }
        };

        let ffprobe = resolve_executable(config.ffprobe.as_deref(), "ffprobe").unwrap_or_else(|e| {
            warn!("{}; media info will be unavailable", e);
            PathBuf::from("ffprobe")
        });
        let prober: Arc<dyn ProbePort> = Arc::new(FfprobeAdapter::new(ffprobe));

        let run_log = Arc::new(RunLogger::new(config.log_dir.clone()));

        Self {
            config,
            collaborators: Collaborators {
                prober,
                detector,
                transcoder,
            },
            run_log,
        }
    }
}

impl AppContainer for DefaultAppContainer {
    fn config(&self) -> &AppConfig {
        &self.config
    }

    fn run_log(&self) -> Arc<RunLogger> {
        Arc::clone(&self.run_log)
    }

    fn session(&self) -> Session {
        Session::new(self.collaborators.clone(), self.config.export_dir.clone())
    }

    fn dispatcher(&self) -> Dispatcher {
        let config = DispatcherConfig {
            watchdog: self.config.watchdog(),
            shutdown_grace: self.config.shutdown_grace(),
        };
        Dispatcher::new(config, Arc::clone(&self.run_log) as Arc<dyn RunLogPort>)
    }
}
