//! Aura Clip
//!
//! Detects scene boundaries in a video and exports the chosen scenes as
//! individual clips.
//!
//! # Usage
//!
//! ```bash
//! auraclip inspect --input talk.mp4
//! auraclip detect --input talk.mp4 --threshold 30 --save talk.scenes.json
//! auraclip export --input talk.mp4 --scenes talk.scenes.json --select 1,3
//! auraclip run --input talk.mp4 --all --out-dir clips
//! auraclip history --kind export
//! ```

use anyhow::Result;
use clap::Parser;
use tracing::info;

use auraclip::app::DefaultAppContainer;
use auraclip::cli::{self, Cli};
use auraclip::config_initialization::initialize_configuration_hierarchy;
use auraclip::utils::logging::LoggingSystem;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = initialize_configuration_hierarchy(&cli)?;
    let logging = LoggingSystem::new(loaded.config.logging());
    logging.initialize()?;
    logging.log_system_info();
    loaded.log_summary();

    let container = DefaultAppContainer::new(loaded.config);
    cli::execute(cli, &container).await?;

    info!("Aura Clip completed successfully");
    Ok(())
}
