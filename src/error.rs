use thiserror::Error;

#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("Invalid forecast horizon {0}: must be between 1 and the configured maximum")]
    InvalidHorizon(u32),

    #[error("Invalid configuration: {0}")]
    InvalidSettings(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Date calculation error: {0}")]
    DateError(String),

    #[error("Deadline exceeded during {phase} after {elapsed_ms}ms")]
    DeadlineExceeded { phase: String, elapsed_ms: u128 },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ForecastError>;
