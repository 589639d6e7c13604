// TOML config adapter - Configuration management using TOML files

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::model::DEFAULT_THRESHOLD;
use crate::error::{AuraError, AuraResult};
use crate::utils::logging::{LogFormat, LogLevel, LoggingConfig};

/// Section name inside the TOML file
pub const CONFIG_SECTION: &str = "auraclip";

/// Files searched, in order, when no explicit path is given
pub const DEFAULT_CONFIG_PATHS: [&str; 2] = ["auraclip.toml", "config/auraclip.toml"];

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Detector threshold on the 0-100 content scale
    pub threshold: f64,
    pub export_dir: PathBuf,
    /// Directory holding the run log stores
    pub log_dir: PathBuf,
    pub watchdog_secs: u64,
    pub shutdown_grace_secs: u64,
    pub video_codec: String,
    pub audio_codec: String,
    /// Explicit ffmpeg executable; `PATH` lookup when unset
    pub ffmpeg: Option<PathBuf>,
    /// Explicit ffprobe executable; `PATH` lookup when unset
    pub ffprobe: Option<PathBuf>,
    pub log_level: LogLevel,
    pub log_format: LogFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            export_dir: PathBuf::from("exports"),
            log_dir: PathBuf::from("logs"),
            watchdog_secs: 60,
            shutdown_grace_secs: 3,
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            ffmpeg: None,
            ffprobe: None,
            log_level: LogLevel::Info,
            log_format: LogFormat::Pretty,
        }
    }
}

impl AppConfig {
    pub fn watchdog(&self) -> Duration {
        Duration::from_secs(self.watchdog_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    pub fn logging(&self) -> LoggingConfig {
        LoggingConfig {
            level: self.log_level,
            format: self.log_format,
            ..LoggingConfig::default()
        }
    }

    /// Reject values the rest of the system cannot work with
    pub fn validate(&self) -> AuraResult<()> {
        if !self.threshold.is_finite() || !(0.0..=100.0).contains(&self.threshold) {
            return Err(config_error(format!(
                "threshold must be between 0 and 100, got {}",
                self.threshold
            )));
        }
        if self.watchdog_secs == 0 {
            return Err(config_error("watchdog_secs must be at least 1"));
        }
        if self.export_dir.as_os_str().is_empty() {
            return Err(config_error("export_dir cannot be empty"));
        }
        if self.log_dir.as_os_str().is_empty() {
            return Err(config_error("log_dir cannot be empty"));
        }
        if self.video_codec.trim().is_empty() || self.audio_codec.trim().is_empty() {
            return Err(config_error("codec names cannot be empty"));
        }
        Ok(())
    }
}

/// TOML configuration adapter
pub struct TomlConfigAdapter;

impl TomlConfigAdapter {
    /// Load the `[auraclip]` section of a TOML file
    pub fn load(path: &Path) -> AuraResult<AppConfig> {
        if !path.exists() {
            return Err(config_error(format!(
                "Config file does not exist: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        Self::deserialize_config(&content)
    }

    /// First existing default config file, if any
    pub fn find_default(base: &Path) -> Option<PathBuf> {
        DEFAULT_CONFIG_PATHS
            .iter()
            .map(|candidate| base.join(candidate))
            .find(|candidate| candidate.is_file())
    }

    /// Deserialize config from TOML string; a missing section means defaults
    pub fn deserialize_config(toml_content: &str) -> AuraResult<AppConfig> {
        let parsed: toml::Table = toml::from_str(toml_content)
            .map_err(|e| config_error(format!("Failed to parse TOML config: {}", e)))?;

        match parsed.get(CONFIG_SECTION) {
            Some(section) => section
                .clone()
                .try_into()
                .map_err(|e| config_error(format!("Invalid [{}] section: {}", CONFIG_SECTION, e))),
            None => Ok(AppConfig::default()),
        }
    }

    /// Serialize config to TOML string
    pub fn serialize_config(config: &AppConfig) -> AuraResult<String> {
        let mut root = toml::Table::new();
        let section = toml::Value::try_from(config)
            .map_err(|e| config_error(format!("Failed to serialize config: {}", e)))?;
        root.insert(CONFIG_SECTION.to_string(), section);
        toml::to_string_pretty(&root)
            .map_err(|e| config_error(format!("Failed to serialize config: {}", e)))
    }
}

fn config_error(message: impl Into<String>) -> AuraError {
    AuraError::ConfigError {
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.threshold, 27.0);
        assert_eq!(config.watchdog(), Duration::from_secs(60));
        assert_eq!(config.shutdown_grace(), Duration::from_secs(3));
    }

    #[test]
    fn test_partial_section_keeps_defaults() {
        let config = TomlConfigAdapter::deserialize_config(
            r#"
            [auraclip]
            threshold = 35.5
            export_dir = "clips"
            log_format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.threshold, 35.5);
        assert_eq!(config.export_dir, PathBuf::from("clips"));
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.video_codec, "libx264");
    }

    #[test]
    fn test_missing_section_is_default() {
        let config = TomlConfigAdapter::deserialize_config("[other]\nkey = 1\n").unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let result = TomlConfigAdapter::deserialize_config("[auraclip\nthreshold = ");
        assert!(matches!(result, Err(AuraError::ConfigError { .. })));

        let result = TomlConfigAdapter::deserialize_config("[auraclip]\nthreshold = \"high\"\n");
        assert!(matches!(result, Err(AuraError::ConfigError { .. })));
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let config = AppConfig {
            threshold: 120.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());

        let config = AppConfig {
            watchdog_secs: 0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_serialize_then_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auraclip.toml");
        let config = AppConfig {
            threshold: 40.0,
            ffmpeg: Some(PathBuf::from("/opt/ffmpeg/bin/ffmpeg")),
            ..AppConfig::default()
        };

        std::fs::write(&path, TomlConfigAdapter::serialize_config(&config).unwrap()).unwrap();
        assert_eq!(TomlConfigAdapter::find_default(dir.path()), Some(path.clone()));
        assert_eq!(TomlConfigAdapter::load(&path).unwrap(), config);
    }
}
