//! Error handling module for Aura Clip

use thiserror::Error;

use crate::domain::errors::DomainError;
use crate::domain::model::JobKind;

/// Main error type for Aura Clip operations
#[derive(Error, Debug)]
pub enum AuraError {
    /// Configuration file or value error
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// Logging subsystem could not be initialized
    #[error("Failed to initialize logging: {message}")]
    LoggingInitError { message: String },

    /// Scene list file could not be read or written
    #[error("Scene list error: {message}")]
    SceneListError { message: String },

    /// Domain rule or collaborator error
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Job submission was rejected
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Rejection raised synchronously by the dispatcher
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// A job of this kind is already in flight; nothing was queued
    #[error("A {kind} job is already running")]
    AlreadyRunning { kind: JobKind },

    /// The dispatcher has been shut down
    #[error("Dispatcher is shut down")]
    ShutDown,

    /// The operating system refused to start a worker thread
    #[error("Failed to spawn {kind} worker: {message}")]
    SpawnFailed { kind: JobKind, message: String },
}

/// Result type alias for Aura Clip operations
pub type AuraResult<T> = std::result::Result<T, AuraError>;
