//! Error types for the staysense pipeline

use thiserror::Error;

/// Result type alias for staysense operations
pub type Result<T> = std::result::Result<T, PredictError>;

/// Main error type for the staysense pipeline
#[derive(Error, Debug)]
pub enum PredictError {
    /// A required field is missing or has the wrong type
    #[error("Schema error: {0}")]
    Schema(String),

    /// A value is outside a transform's valid domain (e.g. log1p of x <= -1)
    #[error("Domain error: {0}")]
    Domain(String),

    /// Transform requested before fit, or on a column unseen at fit time
    #[error("Fit state error: {0}")]
    FitState(String),

    /// Persisted state missing, corrupt, or mismatched across runs
    #[error("Artifact error: {0}")]
    Artifact(String),

    /// Object-store fetch/put failure, including empty-download detection
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Data error: {0}")]
    Data(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    Shape { expected: String, actual: String },
}

impl From<polars::error::PolarsError> for PredictError {
    fn from(err: polars::error::PolarsError) -> Self {
        PredictError::Data(err.to_string())
    }
}

impl From<serde_json::Error> for PredictError {
    fn from(err: serde_json::Error) -> Self {
        PredictError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for PredictError {
    fn from(err: serde_yaml::Error) -> Self {
        PredictError::Config(err.to_string())
    }
}

impl From<ndarray::ShapeError> for PredictError {
    fn from(err: ndarray::ShapeError) -> Self {
        PredictError::Shape {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PredictError::FitState("transform before fit".to_string());
        assert_eq!(err.to_string(), "Fit state error: transform before fit");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: PredictError = io_err.into();
        assert!(matches!(err, PredictError::Io(_)));
    }
}
