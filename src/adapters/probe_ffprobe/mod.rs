//! FFprobe adapter for media file probing
//!
//! Probing is best effort: any failure yields the all-zero `MediaInfo`.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::domain::errors::*;
use crate::domain::model::*;
use crate::ports::*;

/// FFprobe JSON output format
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    duration: Option<String>,
}

/// FFprobe-based probe adapter
pub struct FfprobeAdapter {
    ffprobe: PathBuf,
}

impl FfprobeAdapter {
    /// Create new FFprobe adapter
    pub fn new(ffprobe: PathBuf) -> Self {
        Self { ffprobe }
    }

    fn try_probe(&self, path: &Path) -> Result<MediaInfo, DomainError> {
        if !path.is_file() {
            return Err(DomainError::FileNotFound(path.display().to_string()));
        }

        let output = Command::new(&self.ffprobe)
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| DomainError::CollaboratorUnavailable(format!("ffprobe: {}", e)))?;

        if !output.status.success() {
            return Err(DomainError::ProcessingError(format!(
                "ffprobe exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        parse_probe_json(&output.stdout)
    }
}

impl ProbePort for FfprobeAdapter {
    fn probe(&self, path: &Path) -> MediaInfo {
        match self.try_probe(path) {
            Ok(info) => {
                debug!("Probed {}: {:?}", path.display(), info);
                info
            }
            Err(e) => {
                warn!("Probe failed for {}: {}", path.display(), e);
                MediaInfo::default()
            }
        }
    }
}

/// Extract `MediaInfo` from `ffprobe -print_format json` output
pub fn parse_probe_json(bytes: &[u8]) -> Result<MediaInfo, DomainError> {
    let probe: FfprobeOutput = serde_json::from_slice(bytes)
        .map_err(|e| DomainError::ProcessingError(format!("Invalid ffprobe output: {}", e)))?;

    let video = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| DomainError::ProcessingError("No video stream found".to_string()))?;

    // Container duration first; some muxers only report it per stream
    let duration = probe
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .or(video.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .unwrap_or(0.0);

    let fps = video
        .r_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .unwrap_or(0.0);

    Ok(MediaInfo {
        duration,
        fps,
        width: video.width.unwrap_or(0),
        height: video.height.unwrap_or(0),
    })
}

/// Parse frame rate string like "30000/1001" or "30"
fn parse_frame_rate(rate: &str) -> Option<f64> {
    let value = match rate.split_once('/') {
        Some((num, den)) => {
            let num = num.trim().parse::<f64>().ok()?;
            let den = den.trim().parse::<f64>().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => rate.trim().parse::<f64>().ok()?,
    };
    value.is_finite().then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_probe_json() {
        let json = br#"{
            "streams": [
                {"codec_type": "audio", "r_frame_rate": "0/0"},
                {"codec_type": "video", "width": 1920, "height": 1080, "r_frame_rate": "30000/1001"}
            ],
            "format": {"duration": "9.500000"}
        }"#;

        let info = parse_probe_json(json).unwrap();
        assert_eq!(info.duration, 9.5);
        assert_eq!(info.width, 1920);
        assert_eq!(info.height, 1080);
        assert!((info.fps - 29.97).abs() < 0.01);
    }

    #[test]
    fn test_parse_probe_json_without_video() {
        let json = br#"{"streams": [{"codec_type": "audio"}], "format": {"duration": "3.0"}}"#;
        assert!(parse_probe_json(json).is_err());
    }

    #[test]
    fn test_parse_frame_rate() {
        assert_eq!(parse_frame_rate("25/1"), Some(25.0));
        assert_eq!(parse_frame_rate("24"), Some(24.0));
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("abc"), None);
    }

    #[test]
    fn test_probe_failure_returns_zeroes() {
        let adapter = FfprobeAdapter::new(PathBuf::from("/definitely/not/here/ffprobe"));
        let info = adapter.probe(Path::new("/no/such/video.mp4"));
        assert!(info.is_unknown());
    }
}
