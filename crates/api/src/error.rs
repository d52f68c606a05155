//! HTTP error mapping

use axum::{
    extract::multipart::{MultipartError, MultipartRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use classifier::ClassifyError;
use serde::Serialize;
use thiserror::Error;

/// Errors returned by the HTTP handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Classify(#[from] ClassifyError),

    #[error("Missing multipart field `file`")]
    MissingFile,

    #[error("{detail}")]
    Multipart { status: StatusCode, detail: String },
}

/// JSON error body
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub detail: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Classify(err) => match err {
                ClassifyError::InvalidImage(_) | ClassifyError::EmptyPayload => {
                    StatusCode::BAD_REQUEST
                }
                ClassifyError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
                ClassifyError::EngineUnavailable => StatusCode::SERVICE_UNAVAILABLE,
                ClassifyError::InferenceFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::MissingFile => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Multipart { status, .. } => *status,
        }
    }

    /// Stable machine-readable code, also used as the metrics outcome label
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Classify(err) => err.code(),
            ApiError::MissingFile => "missing_file",
            ApiError::Multipart { .. } => "malformed_upload",
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::Multipart {
            status: err.status(),
            detail: err.body_text(),
        }
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::Multipart {
            status: rejection.status(),
            detail: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.code(),
            detail: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ClassifyError::InvalidImage("x".into()), StatusCode::BAD_REQUEST),
            (ClassifyError::EmptyPayload, StatusCode::BAD_REQUEST),
            (
                ClassifyError::UnsupportedMediaType("text/plain".into()),
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ),
            (ClassifyError::EngineUnavailable, StatusCode::SERVICE_UNAVAILABLE),
            (
                ClassifyError::InferenceFailure("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
        assert_eq!(ApiError::MissingFile.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_codes() {
        assert_eq!(ApiError::from(ClassifyError::EngineUnavailable).code(), "engine_unavailable");
        assert_eq!(ApiError::MissingFile.code(), "missing_file");
    }
}
