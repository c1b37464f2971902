//! Error types for the server

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::error::KickwatchError;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Could not validate API key")]
    Forbidden,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Model not loaded")]
    ModelNotLoaded,

    #[error("Scoring failed: {0}")]
    Scoring(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<KickwatchError> for ServerError {
    fn from(err: KickwatchError) -> Self {
        match err {
            KickwatchError::ValidationError(msg) => ServerError::Validation(msg),
            KickwatchError::ModelNotLoaded => ServerError::ModelNotLoaded,
            KickwatchError::ScoringError(msg) => ServerError::Scoring(msg),
            other => ServerError::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        ServerError::Validation(rejection.body_text())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            ServerError::Forbidden => (StatusCode::FORBIDDEN, self.to_string()),
            ServerError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ServerError::ModelNotLoaded => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Model not loaded. Check MODEL_PATH and server logs.".to_string(),
            ),
            ServerError::Scoring(msg) => {
                tracing::error!(detail = %msg, "Scoring error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Prediction failed".to_string())
            }
            ServerError::Internal(msg) => {
                tracing::error!(detail = %msg, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "An internal error occurred".to_string())
            }
        };

        let body = Json(json!({
            "error": true,
            "message": message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ServerError::from(KickwatchError::ValidationError("x".into())), StatusCode::UNPROCESSABLE_ENTITY),
            (ServerError::from(KickwatchError::ModelNotLoaded), StatusCode::SERVICE_UNAVAILABLE),
            (ServerError::from(KickwatchError::ScoringError("x".into())), StatusCode::INTERNAL_SERVER_ERROR),
            (ServerError::from(KickwatchError::StorageError("x".into())), StatusCode::INTERNAL_SERVER_ERROR),
            (ServerError::Forbidden, StatusCode::FORBIDDEN),
            (ServerError::NotFound("x".into()), StatusCode::NOT_FOUND),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
