//! Logging configuration and subscriber setup

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::error::{AuraError, AuraResult};

/// Log level configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Error messages only
    Error,
    /// Warnings and errors
    Warn,
    /// General information
    Info,
    /// Debug information
    Debug,
    /// Very verbose debug information
    Trace,
}

impl LogLevel {
    /// Parse log level from string
    pub fn parse(level: &str) -> AuraResult<Self> {
        match level.trim().to_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(AuraError::ConfigError {
                message: format!(
                    "Invalid log level: {}. Valid levels: error, warn, info, debug, trace",
                    other
                ),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable multi-line format
    Pretty,
    /// Single-line text format
    Compact,
    /// JSON lines for structured logging
    Json,
}

impl LogFormat {
    /// Parse log format from string
    pub fn parse(format: &str) -> AuraResult<Self> {
        match format.trim().to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(AuraError::ConfigError {
                message: format!(
                    "Invalid log format: {}. Valid formats: pretty, compact, json",
                    other
                ),
            }),
        }
    }
}

/// Logging configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default level when `RUST_LOG` is not set
    pub level: LogLevel,
    /// Output format
    pub format: LogFormat,
    /// Include target module information
    pub target: bool,
    /// Include thread names; useful since every job runs on its own thread
    pub thread: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Pretty,
            target: false,
            thread: true,
        }
    }
}

/// Logging system manager
pub struct LoggingSystem {
    config: LoggingConfig,
}

impl Default for LoggingSystem {
    fn default() -> Self {
        Self::new(LoggingConfig::default())
    }
}

impl LoggingSystem {
    /// Create a new logging system with configuration
    pub fn new(config: LoggingConfig) -> Self {
        Self { config }
    }

    /// Filter directive: `RUST_LOG` wins over the configured level
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.config.level.as_str()))
    }

    /// Install the global subscriber; logs go to stderr
    pub fn initialize(&self) -> AuraResult<()> {
        let builder = tracing_subscriber::fmt()
            .with_env_filter(self.env_filter())
            .with_writer(std::io::stderr)
            .with_target(self.config.target)
            .with_thread_names(self.config.thread);

        let result = match self.config.format {
            LogFormat::Pretty => builder.pretty().try_init(),
            LogFormat::Compact => builder.compact().try_init(),
            LogFormat::Json => builder.json().try_init(),
        };

        result.map_err(|e| AuraError::LoggingInitError {
            message: e.to_string(),
        })?;

        tracing::debug!(
            "Logging initialized: level={}, format={:?}",
            self.config.level.as_str(),
            self.config.format
        );
        Ok(())
    }

    /// Log system information
    pub fn log_system_info(&self) {
        tracing::info!(
            "{} {} ({} {})",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            std::env::consts::OS,
            std::env::consts::ARCH
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parse() {
        assert_eq!(LogLevel::parse("INFO").unwrap(), LogLevel::Info);
        assert_eq!(LogLevel::parse("warning").unwrap(), LogLevel::Warn);
        assert!(LogLevel::parse("loud").is_err());
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("json").unwrap(), LogFormat::Json);
        assert_eq!(LogFormat::parse(" Compact ").unwrap(), LogFormat::Compact);
        assert!(LogFormat::parse("xml").is_err());
    }
}
