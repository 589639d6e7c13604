//! Command-line argument definitions

use std::path::PathBuf;

use clap::Args;

/// Arguments for the inspect command
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Input video file path
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the detect command
#[derive(Args, Debug)]
pub struct DetectArgs {
    /// Input video file path
    #[arg(short, long)]
    pub input: PathBuf,

    /// Detector threshold (0-100); higher means fewer scenes
    #[arg(short, long)]
    pub threshold: Option<f64>,

    /// Write the scene list to this JSON file
    #[arg(long)]
    pub save: Option<PathBuf>,
}

/// Which scenes to export
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct SelectionArgs {
    /// Scene numbers to export, comma separated (e.g. 1,3,4)
    #[arg(long, value_delimiter = ',')]
    pub select: Vec<usize>,

    /// Export every detected scene
    #[arg(long)]
    pub all: bool,
}

/// Arguments for the export command
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Input video file path
    #[arg(short, long)]
    pub input: PathBuf,

    /// Scene list written by `detect --save`; detects first when omitted
    #[arg(long)]
    pub scenes: Option<PathBuf>,

    /// Detector threshold when detecting first
    #[arg(short, long)]
    pub threshold: Option<f64>,

    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Export directory
    #[arg(short, long)]
    pub out_dir: Option<PathBuf>,
}

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Input video file path
    #[arg(short, long)]
    pub input: PathBuf,

    /// Detector threshold (0-100)
    #[arg(short, long)]
    pub threshold: Option<f64>,

    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Export directory
    #[arg(short, long)]
    pub out_dir: Option<PathBuf>,
}

/// Arguments for the history command
#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Job kind (detect or export)
    #[arg(short, long, default_value = "export")]
    pub kind: String,

    /// Most recent entries to show
    #[arg(short, long, default_value_t = 20)]
    pub limit: usize,

    /// Print raw JSON records
    #[arg(long)]
    pub json: bool,
}
