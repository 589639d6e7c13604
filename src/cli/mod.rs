//! CLI module for Aura Clip
//!
//! This module handles command-line argument parsing and command execution.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::app::AppContainer;

pub mod args;
pub mod commands;

/// Aura Clip
///
/// Detects scene boundaries in a video and exports the chosen scenes as
/// individual clips.
#[derive(Parser, Debug)]
#[command(name = "auraclip")]
#[command(about = "Aura Clip - scene detection and clip export")]
#[command(version)]
#[command(long_about = None)]
pub struct Cli {
    /// Configuration file (default: auraclip.toml or config/auraclip.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log output format (pretty, compact, json)
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// The command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show media information for a video
    Inspect(args::InspectArgs),
    /// Detect scenes and list them
    Detect(args::DetectArgs),
    /// Export scenes as clips
    Export(args::ExportArgs),
    /// Detect scenes, then export the selected ones in one session
    Run(args::RunArgs),
    /// Show recorded runs from the run log
    History(args::HistoryArgs),
}

/// Execute the parsed command against the wired application
pub async fn execute(cli: Cli, container: &dyn AppContainer) -> Result<()> {
    match cli.command {
        Commands::Inspect(args) => commands::inspect(container, args),
        Commands::Detect(args) => commands::detect(container, args).await,
        Commands::Export(args) => commands::export(container, args).await,
        Commands::Run(args) => commands::run(container, args).await,
        Commands::History(args) => commands::history(container, args),
    }
}
