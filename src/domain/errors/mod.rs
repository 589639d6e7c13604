// Domain errors - Error types for the domain layer

use std::fmt;

/// Domain-specific error types
///
/// Precondition variants are raised synchronously before a job is submitted;
/// the remaining variants travel inside a job's `Failure` outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainError {
    /// Invalid arguments provided
    BadArgs(String),
    /// No source media has been loaded
    NoSource,
    /// File not found
    FileNotFound(String),
    /// An external collaborator (detector, prober, transcoder) cannot be used
    CollaboratorUnavailable(String),
    /// Media duration is zero or too short to export from
    InvalidDuration(f64),
    /// Export directory cannot be created or written to
    PermissionDenied(String),
    /// Nothing left to do after validation
    NothingToExport(String),
    /// A selection references a scene from an older detection run
    StaleSelection(String),
    /// The scene-boundary detector raised an error
    DetectionFailed(String),
    /// The job observed its interruption flag and stopped early
    Cancelled,
    /// Processing error
    ProcessingError(String),
    /// Internal error
    InternalError(String),
}

impl DomainError {
    /// Whether the error belongs to the precondition class (job never submitted)
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            DomainError::BadArgs(_)
                | DomainError::NoSource
                | DomainError::FileNotFound(_)
                | DomainError::CollaboratorUnavailable(_)
                | DomainError::InvalidDuration(_)
                | DomainError::PermissionDenied(_)
                | DomainError::NothingToExport(_)
                | DomainError::StaleSelection(_)
        )
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainError::BadArgs(msg) => write!(f, "Bad arguments: {}", msg),
            DomainError::NoSource => write!(f, "No source loaded: import a video first"),
            DomainError::FileNotFound(msg) => write!(f, "File not found: {}", msg),
            DomainError::CollaboratorUnavailable(msg) => {
                write!(f, "Collaborator unavailable: {}", msg)
            }
            DomainError::InvalidDuration(d) => {
                write!(f, "Invalid media duration ({:.3}s); cannot export", d)
            }
            DomainError::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
            DomainError::NothingToExport(msg) => write!(f, "Nothing to export: {}", msg),
            DomainError::StaleSelection(msg) => write!(f, "Stale selection: {}", msg),
            DomainError::DetectionFailed(msg) => write!(f, "Scene detection failed: {}", msg),
            DomainError::Cancelled => write!(f, "Job cancelled"),
            DomainError::ProcessingError(msg) => write!(f, "Processing error: {}", msg),
            DomainError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for DomainError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precondition_classification() {
        assert!(DomainError::NoSource.is_precondition());
        assert!(DomainError::InvalidDuration(0.0).is_precondition());
        assert!(DomainError::PermissionDenied("exports".to_string()).is_precondition());
        assert!(!DomainError::Cancelled.is_precondition());
        assert!(!DomainError::DetectionFailed("exit 1".to_string()).is_precondition());
        assert!(!DomainError::InternalError("worker panicked".to_string()).is_precondition());
    }
}
