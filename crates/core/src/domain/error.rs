// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid registration name: {0}")]
    InvalidName(String),

    #[error("Invalid duration for {field}: {reason}")]
    InvalidDuration { field: String, reason: String },

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;

/// Failure raised by a probe while evaluating its dependency
///
/// Captured into the outcome rather than propagated; the engine never
/// surfaces a `ProbeError` to its caller.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Operation timed out after {0}ms")]
    Timeout(u64),

    #[error("Command failed: {0}")]
    Command(String),

    #[error("Probe cancelled")]
    Cancelled,

    #[error("Probe panicked: {0}")]
    Panicked(String),

    #[error("Invalid probe configuration: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl ProbeError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ProbeError::Cancelled)
    }
}
