//! Classification Inference Engine
//!
//! Wraps one loaded model behind a single lock so the non-reentrant runtime
//! only ever runs one forward pass at a time. Models are loaded through the
//! [`ModelLoader`] seam; the production loader reads ONNX with tract.

mod engine;
pub mod mock;
mod onnx;
mod runtime;

pub use engine::{EngineStatus, InferenceEngine};
pub use onnx::{OnnxLoader, OnnxRuntime};
pub use runtime::{ModelLoader, ModelRuntime, RawOutput};

use image_preprocess::DescriptorError;
use thiserror::Error;

/// Errors during model loading and inference
#[derive(Debug, Clone, Error)]
pub enum InferenceError {
    #[error("Model load failed: {0}")]
    ModelLoadError(String),
    #[error("Unsupported model input type: {0}")]
    UnsupportedInputType(String),
    #[error("Unsupported model geometry: {0}")]
    InvalidDescriptor(#[from] DescriptorError),
    #[error("Inference engine is not initialized")]
    EngineUnavailable,
    #[error("Inference failed: {0}")]
    InferenceFailed(String),
    #[error("Invalid input shape: expected {expected}, got {actual}")]
    InvalidInputShape { expected: String, actual: String },
}
