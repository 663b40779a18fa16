use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Signal {0} already belongs to a consensus")]
    DuplicateConsensus(Uuid),

    #[error("Transient I/O error: {0}")]
    Transient(String),

    #[error("Invalid pattern '{name}': {message}")]
    PatternCompile { name: String, message: String },

    #[error("Fatal error: {0}")]
    Fatal(String),
}

impl TrackerError {
    /// True for errors that may succeed on retry (timeouts, dropped
    /// connections). Connection-pool and configuration failures are fatal.
    pub fn is_transient(&self) -> bool {
        matches!(self, TrackerError::Transient(_))
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;
