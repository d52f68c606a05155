//! Image Classification Service
//!
//! Composes preprocessing, the serialized inference engine and score ranking
//! into one request-scoped operation, and owns the engine's startup and
//! shutdown.

pub mod service;
pub mod settings;

pub use image_preprocess::{InputKind, MediaType, ModelDescriptor};
pub use inference_engine::EngineStatus;
pub use score_ranker::{LabelTable, Normalization, PredictionResult, RankedLabel};
pub use service::{ClassificationService, ServiceStatus};
pub use settings::{ClassifierSettings, SettingsError};

use image_preprocess::PreprocessError;
use inference_engine::InferenceError;
use score_ranker::RankError;
use thiserror::Error;

/// Errors surfaced by a classification request
#[derive(Debug, Clone, Error)]
pub enum ClassifyError {
    #[error("Invalid image file: {0}")]
    InvalidImage(String),

    #[error("Unsupported media type {0:?}: only JPEG, PNG, or WEBP images are supported")]
    UnsupportedMediaType(String),

    #[error("Empty file")]
    EmptyPayload,

    #[error("Model not loaded")]
    EngineUnavailable,

    #[error("Inference failed: {0}")]
    InferenceFailure(String),
}

impl ClassifyError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            ClassifyError::InvalidImage(_) => "invalid_image",
            ClassifyError::UnsupportedMediaType(_) => "unsupported_media_type",
            ClassifyError::EmptyPayload => "empty_payload",
            ClassifyError::EngineUnavailable => "engine_unavailable",
            ClassifyError::InferenceFailure(_) => "inference_failure",
        }
    }

    /// Whether the caller sent something unusable (as opposed to a server fault)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ClassifyError::InvalidImage(_)
                | ClassifyError::UnsupportedMediaType(_)
                | ClassifyError::EmptyPayload
        )
    }
}

impl From<PreprocessError> for ClassifyError {
    fn from(err: PreprocessError) -> Self {
        match err {
            PreprocessError::InvalidImage(msg) => ClassifyError::InvalidImage(msg),
            other => ClassifyError::InferenceFailure(other.to_string()),
        }
    }
}

impl From<InferenceError> for ClassifyError {
    fn from(err: InferenceError) -> Self {
        match err {
            InferenceError::EngineUnavailable => ClassifyError::EngineUnavailable,
            other => ClassifyError::InferenceFailure(other.to_string()),
        }
    }
}

impl From<RankError> for ClassifyError {
    fn from(err: RankError) -> Self {
        ClassifyError::InferenceFailure(err.to_string())
    }
}
