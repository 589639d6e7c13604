//! Configuration initialization and hierarchy management

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::adapters::toml_config::{AppConfig, TomlConfigAdapter};
use crate::cli::{Cli, Commands};
use crate::error::{AuraError, AuraResult};
use crate::utils::logging::{LogFormat, LogLevel};

/// Configuration plus where its values came from
///
/// Built before logging exists, so the provenance is logged afterwards by
/// [`LoadedConfig::log_summary`].
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: AppConfig,
    /// Config file that was read, if any
    pub file: Option<PathBuf>,
    pub env_overrides: usize,
    pub cli_overrides: usize,
}

impl LoadedConfig {
    pub fn log_summary(&self) {
        match &self.file {
            Some(path) => info!("Loaded configuration from {}", path.display()),
            None => info!("No configuration file found, using defaults"),
        }
        if self.env_overrides > 0 {
            debug!("Applied {} environment variable overrides", self.env_overrides);
        }
        if self.cli_overrides > 0 {
            debug!("Applied {} CLI configuration overrides", self.cli_overrides);
        }
    }
}

/// Build the configuration following precedence: CLI > Env > File > Defaults
pub fn initialize_configuration_hierarchy(cli: &Cli) -> AuraResult<LoadedConfig> {
    // Step 1 and 2: defaults, overlaid by the first config file found
    let (mut config, file) = load_config_file(cli.config.as_deref())?;

    // Step 3: environment variables
    let env_overrides = apply_environment(&mut config, |key| std::env::var(key).ok())?;

    // Step 4: command line
    let cli_overrides = apply_cli_overrides(&mut config, cli)?;

    config.validate()?;
    Ok(LoadedConfig {
        config,
        file,
        env_overrides,
        cli_overrides,
    })
}

/// Load configuration from an explicit file or the default locations
fn load_config_file(explicit: Option<&Path>) -> AuraResult<(AppConfig, Option<PathBuf>)> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => TomlConfigAdapter::find_default(Path::new(".")),
    };

    match path {
        Some(path) => Ok((TomlConfigAdapter::load(&path)?, Some(path))),
        None => Ok((AppConfig::default(), None)),
    }
}

/// Overlay `AURACLIP_*` variables; returns how many were applied
pub fn apply_environment<F>(config: &mut AppConfig, lookup: F) -> AuraResult<usize>
where
    F: Fn(&str) -> Option<String>,
{
    let mut applied = 0;

    if let Some(value) = lookup("AURACLIP_THRESHOLD") {
        config.threshold = parse_env("AURACLIP_THRESHOLD", &value)?;
        applied += 1;
    }
    if let Some(value) = lookup("AURACLIP_EXPORT_DIR") {
        config.export_dir = PathBuf::from(value);
        applied += 1;
    }
    if let Some(value) = lookup("AURACLIP_LOG_DIR") {
        config.log_dir = PathBuf::from(value);
        applied += 1;
    }
    if let Some(value) = lookup("AURACLIP_WATCHDOG_SECS") {
        config.watchdog_secs = parse_env("AURACLIP_WATCHDOG_SECS", &value)?;
        applied += 1;
    }
    if let Some(value) = lookup("AURACLIP_FFMPEG") {
        config.ffmpeg = Some(PathBuf::from(value));
        applied += 1;
    }
    if let Some(value) = lookup("AURACLIP_FFPROBE") {
        config.ffprobe = Some(PathBuf::from(value));
        applied += 1;
    }
    if let Some(value) = lookup("AURACLIP_LOG_LEVEL") {
        config.log_level = LogLevel::parse(&value)?;
        applied += 1;
    }

    Ok(applied)
}

/// Apply CLI argument overrides to configuration
pub fn apply_cli_overrides(config: &mut AppConfig, cli: &Cli) -> AuraResult<usize> {
    let mut applied = 0;

    if let Some(level) = &cli.log_level {
        config.log_level = LogLevel::parse(level)?;
        applied += 1;
    }
    if let Some(format) = &cli.log_format {
        config.log_format = LogFormat::parse(format)?;
        applied += 1;
    }

    let (threshold, out_dir) = match &cli.command {
        Commands::Detect(args) => (args.threshold, None),
        Commands::Export(args) => (args.threshold, args.out_dir.as_ref()),
        Commands::Run(args) => (args.threshold, args.out_dir.as_ref()),
        Commands::Inspect(_) | Commands::History(_) => (None, None),
    };

    if let Some(threshold) = threshold {
        config.threshold = threshold;
        applied += 1;
    }
    if let Some(out_dir) = out_dir {
        config.export_dir = out_dir.clone();
        applied += 1;
    }

    Ok(applied)
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> AuraResult<T> {
    value.trim().parse::<T>().map_err(|_| AuraError::ConfigError {
        message: format!("Invalid value for {}: {}", key, value),
    })
}
