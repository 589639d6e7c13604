//! Aura Clip Library
//!
//! Scene detection and clip export for video files. Long-running ffmpeg
//! work runs as background jobs under a single-flight dispatcher with a
//! watchdog; every finished job is recorded in an append-only run log.

pub mod adapters;
pub mod app;
pub mod cli;
pub mod config_initialization;
pub mod domain;
pub mod engine;
pub mod error;
pub mod output;
pub mod ports;
pub mod utils;

// Re-export commonly used types
pub use domain::errors::DomainError;
pub use domain::model::{JobKind, JobOutcome, MediaInfo, Scene, Selection};
pub use engine::{Dispatcher, DispatcherConfig, Job, JobToken};
pub use error::{AuraError, AuraResult, DispatchError};
