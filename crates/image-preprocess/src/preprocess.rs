//! Bytes to tensor conversion

use image::imageops::{self, FilterType};
use ndarray::Array4;
use tracing::debug;

use crate::{InputKind, InputTensor, MediaType, ModelDescriptor, PreprocessError};

/// Decode `bytes` and produce the tensor `descriptor` declares.
///
/// The real format is sniffed from the payload; `media_type` is the declared
/// one and only used for diagnostics.
pub fn preprocess(
    bytes: &[u8],
    media_type: MediaType,
    descriptor: &ModelDescriptor,
) -> Result<InputTensor, PreprocessError> {
    if let Ok(sniffed) = image::guess_format(bytes) {
        if sniffed != media_type.image_format() {
            debug!("Declared {} but payload looks like {:?}", media_type, sniffed);
        }
    }

    let decoded = image::load_from_memory(bytes)
        .map_err(|e| PreprocessError::InvalidImage(e.to_string()))?;
    debug!(
        "Decoded {}x{} {:?} image",
        decoded.width(),
        decoded.height(),
        decoded.color()
    );

    // Alpha and palette information is dropped here
    let rgb = decoded.to_rgb8();
    let resized = imageops::resize(
        &rgb,
        descriptor.width,
        descriptor.height,
        FilterType::Triangle,
    );

    let [n, h, w, c] = descriptor.input_shape();
    let pixels = resized.into_raw();

    let tensor = match descriptor.input_kind {
        InputKind::Uint8 => Array4::from_shape_vec((n, h, w, c), pixels).map(InputTensor::Uint8),
        InputKind::Float32 => {
            let scaled: Vec<f32> = pixels
                .into_iter()
                .map(|v| InputKind::Float32.scale(v))
                .collect();
            Array4::from_shape_vec((n, h, w, c), scaled).map(InputTensor::Float32)
        }
    };

    tensor.map_err(|e| PreprocessError::Tensor(e.to_string()))
}
