//! Error types for the serving layer

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServingError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<crate::error::PredictError> for ServingError {
    fn from(err: crate::error::PredictError) -> Self {
        use crate::error::PredictError;
        match err {
            PredictError::Schema(msg) | PredictError::Domain(msg) => {
                ServingError::BadRequest(msg)
            }
            other => ServingError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ServingError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServingError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ServingError::Internal(msg) => {
                tracing::error!(detail = %msg, "internal serving error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
        };

        (status, message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PredictError;

    #[test]
    fn test_schema_error_maps_to_bad_request() {
        let err: ServingError = PredictError::Schema("missing field".to_string()).into();
        assert!(matches!(err, ServingError::BadRequest(_)));
    }

    #[test]
    fn test_artifact_error_maps_to_internal() {
        let err: ServingError = PredictError::Artifact("corrupt".to_string()).into();
        assert!(matches!(err, ServingError::Internal(_)));
    }
}
