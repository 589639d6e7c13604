//! FFmpeg execution adapter
//!
//! Builds ffmpeg command lines and runs the transcoder once per export item.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, warn};

use crate::domain::errors::*;
use crate::ports::*;

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Input file path
    input: PathBuf,
    /// Output file path
    output: PathBuf,
    /// Input arguments (before -i)
    input_args: Vec<String>,
    /// Output arguments (after -i)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
    /// Log level
    log_level: String,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            input_args: Vec::new(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Add input arguments (before -i).
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        self.input_args.push(arg.into());
        self
    }

    /// Add output arguments (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Seek before the input so ffmpeg skips decoding the lead-in.
    pub fn seek(self, seconds: f64) -> Self {
        self.input_arg("-ss").input_arg(format!("{:.3}", seconds))
    }

    /// Stop at an absolute timestamp of the input.
    pub fn until(self, seconds: f64) -> Self {
        self.input_arg("-to").input_arg(format!("{:.3}", seconds))
    }

    /// Set video codec.
    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    /// Set audio codec.
    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:a").output_arg(codec)
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-loglevel".to_string());
        args.push(self.log_level.clone());

        args.extend(self.input_args.iter().cloned());

        args.push("-i".to_string());
        args.push(self.input.to_string_lossy().to_string());

        args.extend(self.output_args.iter().cloned());

        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// Resolve an executable from an explicit path or the `PATH`.
pub fn resolve_executable(configured: Option<&Path>, name: &str) -> Result<PathBuf, DomainError> {
    match configured {
        Some(path) if path.is_file() => Ok(path.to_path_buf()),
        Some(path) => which::which(path).map_err(|_| {
            DomainError::CollaboratorUnavailable(format!(
                "{} not found at {}",
                name,
                path.display()
            ))
        }),
        None => which::which(name).map_err(|_| {
            DomainError::CollaboratorUnavailable(format!("{} not found on PATH", name))
        }),
    }
}

/// Transcoder backed by the ffmpeg executable
pub struct FfmpegTranscodeAdapter {
    ffmpeg: PathBuf,
    video_codec: String,
    audio_codec: String,
}

impl FfmpegTranscodeAdapter {
    /// Create new FFmpeg adapter
    pub fn new(
        ffmpeg: PathBuf,
        video_codec: impl Into<String>,
        audio_codec: impl Into<String>,
    ) -> Self {
        Self {
            ffmpeg,
            video_codec: video_codec.into(),
            audio_codec: audio_codec.into(),
        }
    }

    /// Command line for one cut
    pub fn slice_command(
        &self,
        source: &Path,
        start_s: f64,
        end_s: f64,
        dest: &Path,
    ) -> FfmpegCommand {
        FfmpegCommand::new(source, dest)
            .seek(start_s)
            .until(end_s)
            .video_codec(self.video_codec.clone())
            .audio_codec(self.audio_codec.clone())
    }
}

impl TranscodePort for FfmpegTranscodeAdapter {
    fn check_available(&self) -> Result<(), DomainError> {
        let status = Command::new(&self.ffmpeg)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| {
                DomainError::CollaboratorUnavailable(format!(
                    "ffmpeg is not runnable ({}): {}",
                    self.ffmpeg.display(),
                    e
                ))
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(DomainError::CollaboratorUnavailable(format!(
                "ffmpeg -version exited with {}",
                status
            )))
        }
    }

    fn transcode(&self, source: &Path, start_s: f64, end_s: f64, dest: &Path) -> TranscodeResult {
        let args = self.slice_command(source, start_s, end_s, dest).build_args();
        debug!("Running FFmpeg: {} {}", self.ffmpeg.display(), args.join(" "));

        let output = match Command::new(&self.ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
        {
            Ok(output) => output,
            Err(e) => return TranscodeResult::failed(format!("{:?}: {}", e.kind(), e)),
        };

        let diagnostic = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let size = std::fs::metadata(dest).map(|m| m.len()).unwrap_or(0);

        if output.status.success() && size > 0 {
            return TranscodeResult::success();
        }

        // An empty file must never pass for an exported clip
        if dest.exists() && size == 0 {
            if let Err(e) = std::fs::remove_file(dest) {
                warn!("Could not remove empty output {}: {}", dest.display(), e);
            }
        }

        if diagnostic.is_empty() && !output.status.success() {
            TranscodeResult::failed(format!("ffmpeg exited with {}", output.status))
        } else if diagnostic.is_empty() {
            TranscodeResult::failed("ffmpeg produced no output file")
        } else {
            TranscodeResult::failed(diagnostic)
        }
    }
}
