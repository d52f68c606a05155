//! Image Preprocessing
//!
//! Turns an uploaded JPEG/PNG/WEBP payload into the exact tensor a
//! classification model declares:
//! - RGB coercion (alpha and palette dropped)
//! - Bilinear resize to the model geometry, aspect ratio ignored
//! - NHWC layout with a leading batch dimension of 1
//! - Per-dtype scaling (float32 to unit range, uint8 untouched)

pub mod descriptor;
pub mod media;
pub mod preprocess;
pub mod tensor;

pub use descriptor::{InputKind, ModelDescriptor};
pub use media::MediaType;
pub use preprocess::preprocess;
pub use tensor::InputTensor;

use thiserror::Error;

/// Errors while turning bytes into a tensor
#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("Invalid image file: {0}")]
    InvalidImage(String),

    #[error("Tensor construction failed: {0}")]
    Tensor(String),
}

/// Errors while deriving a model descriptor from a declared input shape
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    #[error("Unsupported input rank {0}: expected [batch, h, w, c] or [h, w, c]")]
    UnsupportedRank(usize),

    #[error("Input dimension {axis} must be positive, got {value}")]
    NonPositiveDimension { axis: &'static str, value: usize },

    #[error("Input dimension {axis} value {value} exceeds supported range")]
    DimensionTooLarge { axis: &'static str, value: usize },

    #[error("Unsupported channel count {0}: images are decoded as 3-channel RGB")]
    UnsupportedChannels(u32),

    #[error("Model declares an empty output vector")]
    EmptyOutput,
}
