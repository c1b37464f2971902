//! Error types for the kickwatch service

use thiserror::Error;

/// Result type alias for kickwatch operations
pub type Result<T> = std::result::Result<T, KickwatchError>;

/// Main error type for the prediction and monitoring pipeline
#[derive(Error, Debug)]
pub enum KickwatchError {
    /// Bad input shape or range. Client fault, never logged as a prediction.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Model invocation failed. Fatal for the request and not retried.
    #[error("Scoring error: {0}")]
    ScoringError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Insufficient data: {window} window has {actual} samples, at least {required} required")]
    InsufficientData {
        window: String,
        required: usize,
        actual: usize,
    },

    #[error("Model not loaded")]
    ModelNotLoaded,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },
}

impl From<polars::error::PolarsError> for KickwatchError {
    fn from(err: polars::error::PolarsError) -> Self {
        KickwatchError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for KickwatchError {
    fn from(err: serde_json::Error) -> Self {
        KickwatchError::SerializationError(err.to_string())
    }
}

impl From<rusqlite::Error> for KickwatchError {
    fn from(err: rusqlite::Error) -> Self {
        KickwatchError::StorageError(err.to_string())
    }
}
