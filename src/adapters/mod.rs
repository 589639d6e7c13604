// Adapters - External system implementations

pub mod detect_ffmpeg;
pub mod exec_ffmpeg;
pub mod probe_ffprobe;
pub mod toml_config;

// Re-export adapters
pub use detect_ffmpeg::{select_detector, ScdetDetector, SelectShowinfoDetector};
pub use exec_ffmpeg::{resolve_executable, FfmpegCommand, FfmpegTranscodeAdapter};
pub use probe_ffprobe::FfprobeAdapter;
pub use toml_config::{AppConfig, TomlConfigAdapter};
