//! Error types for the search pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, TofError>;

/// Main error type for the search pipeline
#[derive(Error, Debug)]
pub enum TofError {
    /// Invalid run or search configuration, raised before any expensive work
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Train/test pieces disagree on sample counts, or a split side is empty
    #[error("Data integrity error: {0}")]
    DataIntegrityError(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl TofError {
    /// Attach a path to an I/O error
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TofError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<std::io::Error> for TofError {
    fn from(err: std::io::Error) -> Self {
        TofError::Io {
            path: PathBuf::new(),
            source: err,
        }
    }
}

impl From<polars::error::PolarsError> for TofError {
    fn from(err: polars::error::PolarsError) -> Self {
        TofError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for TofError {
    fn from(err: serde_json::Error) -> Self {
        TofError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for TofError {
    fn from(err: ndarray::ShapeError) -> Self {
        TofError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
