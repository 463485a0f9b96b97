//! Error types for the fusion service HTTP layer
//!
//! Fusion and liveness errors map to status codes here; the JSON body is
//! always `{"error": {"code", "message"}}`.

use crate::fusion::FusionError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Fusion rejected the signal set or is misconfigured
    #[error(transparent)]
    Fusion(#[from] FusionError),

    /// mediarisk-common error
    #[error("Common error: {0}")]
    Common(#[from] mediarisk_common::Error),
}

impl ApiError {
    /// Status code and machine-readable error code
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Fusion(err) => match err {
                FusionError::NoSignals => (StatusCode::SERVICE_UNAVAILABLE, "NO_SIGNALS"),
                FusionError::UnknownModality { .. } => (StatusCode::BAD_REQUEST, "UNKNOWN_MODALITY"),
                FusionError::DuplicateModality(_) => (StatusCode::BAD_REQUEST, "DUPLICATE_MODALITY"),
                FusionError::InvalidScore(_) => (StatusCode::BAD_REQUEST, "INVALID_SCORE"),
                FusionError::EmptyFrameSequence => (StatusCode::BAD_REQUEST, "EMPTY_FRAME_SEQUENCE"),
                FusionError::Configuration(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "CONFIGURATION_ERROR")
                }
            },
            ApiError::Common(mediarisk_common::Error::InvalidInput(_)) => {
                (StatusCode::BAD_REQUEST, "INVALID_INPUT")
            }
            ApiError::Common(_) => (StatusCode::INTERNAL_SERVER_ERROR, "COMMON_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.status_and_code();
        let message = self.to_string();

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_signals_is_service_unavailable() {
        let (status, code) = ApiError::from(FusionError::NoSignals).status_and_code();
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(code, "NO_SIGNALS");
    }

    #[test]
    fn test_request_errors_are_bad_request() {
        for err in [
            FusionError::DuplicateModality("transformer".into()),
            FusionError::EmptyFrameSequence,
            FusionError::InvalidScore("remote_api".into()),
        ] {
            assert_eq!(ApiError::from(err).status_and_code().0, StatusCode::BAD_REQUEST);
        }

        let invalid = mediarisk_common::Error::InvalidInput("security level".into());
        assert_eq!(ApiError::from(invalid).status_and_code().0, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_configuration_error_is_internal() {
        let (status, _) = ApiError::from(FusionError::Configuration("sum".into())).status_and_code();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
