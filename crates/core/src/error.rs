// Central Error Type for the Engine

use thiserror::Error;

/// Engine-level error type
///
/// Probe and publisher failures never appear here; they are recovered into
/// report entries and log lines. What remains is setup-time misuse and
/// caller-driven cancellation.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("Duplicate registration: {0}")]
    DuplicateRegistration(String),

    #[error("Run cancelled by caller")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// True when the run was aborted by its owner rather than failing
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AppError::Cancelled)
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
