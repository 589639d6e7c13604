//! FFmpeg scene-boundary detector adapters
//!
//! Two filter graphs report scene changes in incompatible shapes. `scdet`
//! prints boundary times in seconds; the older `select`+`showinfo` graph
//! prints PTS ticks together with the stream timebase. The capability probe
//! picks one strategy when the process starts.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;

use tracing::{debug, info};

use crate::domain::errors::*;
use crate::domain::model::*;
use crate::ports::*;

/// Probe the ffmpeg build and return the matching detector strategy
pub fn select_detector(ffmpeg: &Path) -> Result<Arc<dyn SceneDetectorPort>, DomainError> {
    let output = Command::new(ffmpeg)
        .args(["-hide_banner", "-filters"])
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .map_err(|e| {
            DomainError::CollaboratorUnavailable(format!(
                "scene detector not runnable ({}): {}",
                ffmpeg.display(),
                e
            ))
        })?;

    if !output.status.success() {
        return Err(DomainError::CollaboratorUnavailable(format!(
            "ffmpeg -filters exited with {}",
            output.status
        )));
    }

    let api = detector_api_from_filters(&String::from_utf8_lossy(&output.stdout));
    info!("Scene detector API selected: {}", api);

    Ok(match api {
        DetectorApi::Scdet => Arc::new(ScdetDetector::new(ffmpeg.to_path_buf())),
        DetectorApi::SelectShowinfo => Arc::new(SelectShowinfoDetector::new(ffmpeg.to_path_buf())),
    })
}

/// Pick the API shape from `ffmpeg -filters` output
pub fn detector_api_from_filters(filters: &str) -> DetectorApi {
    let has_scdet = filters
        .lines()
        .any(|line| line.split_whitespace().nth(1) == Some("scdet"));

    if has_scdet {
        DetectorApi::Scdet
    } else {
        DetectorApi::SelectShowinfo
    }
}

/// Detector using the dedicated `scdet` filter
pub struct ScdetDetector {
    ffmpeg: PathBuf,
}

impl ScdetDetector {
    pub fn new(ffmpeg: PathBuf) -> Self {
        Self { ffmpeg }
    }

    fn filter(config: &DetectorConfig) -> String {
        format!(
            "scdet=threshold={:.3},metadata=print:key=lavfi.scd.time",
            config.threshold.clamp(0.0, 100.0)
        )
    }
}

impl SceneDetectorPort for ScdetDetector {
    fn api(&self) -> DetectorApi {
        DetectorApi::Scdet
    }

    fn open(&self, path: &Path) -> Result<DetectorHandle, DomainError> {
        open_source(path)
    }

    fn run(
        &self,
        handle: &DetectorHandle,
        config: &DetectorConfig,
    ) -> Result<Vec<(Timecode, Timecode)>, DomainError> {
        let stderr = run_filter_graph(&self.ffmpeg, &handle.path, &Self::filter(config))?;
        let cuts = parse_scdet_times(&stderr);
        let duration = parse_duration(&stderr);
        debug!("scdet reported {} boundaries", cuts.len());

        if cuts.is_empty() {
            return Ok(Vec::new());
        }
        let duration = duration.ok_or_else(|| {
            DomainError::DetectionFailed("could not determine media duration".to_string())
        })?;

        Ok(bounded_ranges(cuts, 0.0, duration)
            .into_iter()
            .map(|(start, end)| (Timecode::Seconds(start), Timecode::Seconds(end)))
            .collect())
    }

    fn extract_seconds(&self, timecode: &Timecode) -> f64 {
        timecode_seconds(timecode)
    }
}

/// Detector using `select='gt(scene,x)'` followed by `showinfo`
pub struct SelectShowinfoDetector {
    ffmpeg: PathBuf,
}

impl SelectShowinfoDetector {
    pub fn new(ffmpeg: PathBuf) -> Self {
        Self { ffmpeg }
    }

    fn filter(config: &DetectorConfig) -> String {
        // The scene score is 0-1 while the threshold is on a 0-100 scale
        format!(
            "select='gt(scene,{:.4})',showinfo",
            config.threshold.clamp(0.0, 100.0) / 100.0
        )
    }
}

impl SceneDetectorPort for SelectShowinfoDetector {
    fn api(&self) -> DetectorApi {
        DetectorApi::SelectShowinfo
    }

    fn open(&self, path: &Path) -> Result<DetectorHandle, DomainError> {
        open_source(path)
    }

    fn run(
        &self,
        handle: &DetectorHandle,
        config: &DetectorConfig,
    ) -> Result<Vec<(Timecode, Timecode)>, DomainError> {
        let stderr = run_filter_graph(&self.ffmpeg, &handle.path, &Self::filter(config))?;
        let (time_base, cuts) = parse_showinfo(&stderr);
        debug!("showinfo reported {} boundaries", cuts.len());

        if cuts.is_empty() {
            return Ok(Vec::new());
        }
        let time_base = time_base.ok_or_else(|| {
            DomainError::DetectionFailed("showinfo reported no time base".to_string())
        })?;
        let duration = parse_duration(&stderr).ok_or_else(|| {
            DomainError::DetectionFailed("could not determine media duration".to_string())
        })?;

        let end = time_base.seconds_to_pts(duration);
        Ok(bounded_ranges(cuts, 0, end)
            .into_iter()
            .map(|(start, end)| {
                (
                    Timecode::Pts { pts: start, time_base },
                    Timecode::Pts { pts: end, time_base },
                )
            })
            .collect())
    }

    fn extract_seconds(&self, timecode: &Timecode) -> f64 {
        timecode_seconds(timecode)
    }
}

fn timecode_seconds(timecode: &Timecode) -> f64 {
    match timecode {
        Timecode::Seconds(seconds) => *seconds,
        Timecode::Pts { pts, time_base } => time_base.pts_to_seconds(*pts),
    }
}

fn open_source(path: &Path) -> Result<DetectorHandle, DomainError> {
    if !path.is_file() {
        return Err(DomainError::FileNotFound(path.display().to_string()));
    }
    Ok(DetectorHandle {
        path: path.to_path_buf(),
    })
}

/// Decode the video through a filter graph and return ffmpeg's stderr
fn run_filter_graph(ffmpeg: &Path, source: &Path, filter: &str) -> Result<String, DomainError> {
    debug!("Running detector graph on {}: {}", source.display(), filter);

    let output = Command::new(ffmpeg)
        .args(["-hide_banner", "-nostats", "-i"])
        .arg(source)
        .args(["-an", "-sn", "-vf", filter, "-f", "null", "-"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| DomainError::DetectionFailed(format!("could not start detector: {}", e)))?;

    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    if !output.status.success() {
        let tail: Vec<&str> = stderr.lines().rev().take(3).collect();
        let tail: Vec<&str> = tail.into_iter().rev().collect();
        return Err(DomainError::DetectionFailed(format!(
            "detector exited with {}: {}",
            output.status,
            tail.join(" | ").trim()
        )));
    }

    Ok(stderr)
}

/// Turn boundary points into consecutive `(start, end)` pairs
///
/// Points outside `(origin, end)` are discarded; no points means no scenes.
fn bounded_ranges<T>(mut cuts: Vec<T>, origin: T, end: T) -> Vec<(T, T)>
where
    T: PartialOrd + Copy,
{
    cuts.retain(|cut| *cut > origin && *cut < end);
    cuts.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    cuts.dedup_by(|a, b| a == b);

    if cuts.is_empty() {
        return Vec::new();
    }

    let mut points = Vec::with_capacity(cuts.len() + 2);
    points.push(origin);
    points.extend(cuts);
    points.push(end);

    points.windows(2).map(|pair| (pair[0], pair[1])).collect()
}

/// `Duration: HH:MM:SS.cc` from ffmpeg's input summary
pub fn parse_duration(stderr: &str) -> Option<f64> {
    stderr.lines().find_map(|line| {
        let rest = line.trim().strip_prefix("Duration:")?;
        let stamp = rest.split(',').next()?.trim();
        let mut parts = stamp.split(':');
        let hours = parts.next()?.parse::<f64>().ok()?;
        let minutes = parts.next()?.parse::<f64>().ok()?;
        let seconds = parts.next()?.parse::<f64>().ok()?;
        Some(hours * 3600.0 + minutes * 60.0 + seconds)
    })
}

/// Boundary times printed by `metadata=print` after `scdet`
pub fn parse_scdet_times(stderr: &str) -> Vec<f64> {
    stderr
        .lines()
        .filter_map(|line| {
            let (_, value) = line.split_once("lavfi.scd.time=")?;
            value.trim().parse::<f64>().ok()
        })
        .collect()
}

/// Stream timebase and frame PTS values printed by `showinfo`
pub fn parse_showinfo(stderr: &str) -> (Option<Timebase>, Vec<i64>) {
    let mut time_base = None;
    let mut pts_values = Vec::new();

    for line in stderr.lines().filter(|line| line.contains("Parsed_showinfo")) {
        if let Some((_, rest)) = line.split_once("time_base:") {
            if time_base.is_none() {
                let text = rest.split(',').next().unwrap_or_default();
                time_base = Timebase::parse(text).ok();
            }
            continue;
        }

        if !line.contains(" n:") {
            continue;
        }
        if let Some((_, rest)) = line.split_once(" pts:") {
            if let Some(Ok(pts)) = rest.split_whitespace().next().map(str::parse::<i64>) {
                pts_values.push(pts);
            }
        }
    }

    (time_base, pts_values)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCDET_STDERR: &str = "\
Input #0, mov,mp4,m4a,3gp,3g2,mj2, from 'clip.mp4':
  Duration: 00:00:09.50, start: 0.000000, bitrate: 1205 kb/s
[Parsed_metadata_1 @ 0x5581] frame:125  pts:64000   pts_time:5
[Parsed_metadata_1 @ 0x5581] lavfi.scd.time=5
[Parsed_metadata_1 @ 0x5581] frame:225  pts:115200  pts_time:9
[Parsed_metadata_1 @ 0x5581] lavfi.scd.time=9
";

    const SHOWINFO_STDERR: &str = "\
Input #0, matroska,webm, from 'clip.mkv':
  Duration: 00:00:09.50, start: 0.000000, bitrate: 900 kb/s
[Parsed_showinfo_1 @ 0x55d0] config in time_base: 1/12800, frame_rate: 25/1
[Parsed_showinfo_1 @ 0x55d0] config out time_base: 0/0, frame_rate: 0/0, size: 0x0
[Parsed_showinfo_1 @ 0x55d0] n:   0 pts:  64000 pts_time:5       duration:    512
[Parsed_showinfo_1 @ 0x55d0] n:   1 pts: 115200 pts_time:9       duration:    512
";

    #[test]
    fn test_detector_api_from_filters() {
        let modern = " ... scale             V->V       Scale the input video size.\n \
                      ... scdet             V->V       Detect video scene change\n";
        let legacy = " ... scale             V->V       Scale the input video size.\n \
                      ... select            V->N       Select video frames to pass in output.\n";

        assert_eq!(detector_api_from_filters(modern), DetectorApi::Scdet);
        assert_eq!(detector_api_from_filters(legacy), DetectorApi::SelectShowinfo);
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration(SCDET_STDERR), Some(9.5));
        assert_eq!(parse_duration("  Duration: 01:02:03.25, start: 0"), Some(3723.25));
        assert_eq!(parse_duration("  Duration: N/A, bitrate: N/A"), None);
    }

    #[test]
    fn test_parse_scdet_times() {
        assert_eq!(parse_scdet_times(SCDET_STDERR), vec![5.0, 9.0]);
    }

    #[test]
    fn test_parse_showinfo() {
        let (time_base, pts) = parse_showinfo(SHOWINFO_STDERR);
        assert_eq!(time_base, Some(Timebase { num: 1, den: 12800 }));
        assert_eq!(pts, vec![64000, 115200]);
    }

    #[test]
    fn test_bounded_ranges() {
        assert_eq!(
            bounded_ranges(vec![9.0, 5.0, 5.0, 0.0, 12.0], 0.0, 9.5),
            vec![(0.0, 5.0), (5.0, 9.0), (9.0, 9.5)]
        );
        assert!(bounded_ranges(Vec::<i64>::new(), 0, 100).is_empty());
    }

    #[test]
    fn test_both_shapes_normalize_to_the_same_seconds() {
        let scdet = ScdetDetector::new(PathBuf::from("ffmpeg"));
        let legacy = SelectShowinfoDetector::new(PathBuf::from("ffmpeg"));
        let time_base = Timebase::new(1, 12800).unwrap();

        let a = scdet.extract_seconds(&Timecode::Seconds(5.0));
        let b = legacy.extract_seconds(&Timecode::Pts {
            pts: 64000,
            time_base,
        });
        assert_eq!(a, b);
    }

    #[test]
    fn test_filters_scale_threshold() {
        let config = DetectorConfig { threshold: 27.0 };
        assert_eq!(
            ScdetDetector::filter(&config),
            "scdet=threshold=27.000,metadata=print:key=lavfi.scd.time"
        );
        assert_eq!(
            SelectShowinfoDetector::filter(&config),
            "select='gt(scene,0.2700)',showinfo"
        );
    }

    #[test]
    fn test_open_missing_source() {
        let detector = ScdetDetector::new(PathBuf::from("ffmpeg"));
        assert!(matches!(
            detector.open(Path::new("/no/such/video.mp4")),
            Err(DomainError::FileNotFound(_))
        ));
    }
}
