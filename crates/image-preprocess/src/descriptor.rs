//! Model input geometry and numeric type

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::DescriptorError;

/// Channel count produced by the decoder
pub const RGB_CHANNELS: u32 = 3;

/// Numeric type a model accepts as input.
///
/// Closed on purpose: a model declaring anything else is rejected when it is
/// loaded rather than fed a best-effort cast at request time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    /// Pixels scaled to `[0.0, 1.0]`
    Float32,
    /// Raw pixels `0..=255`
    Uint8,
}

impl InputKind {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            InputKind::Float32 => "float32",
            InputKind::Uint8 => "uint8",
        }
    }

    /// Scale one 8-bit channel value for this kind
    pub fn scale(&self, value: u8) -> f32 {
        match self {
            InputKind::Float32 => value as f32 / 255.0,
            InputKind::Uint8 => value as f32,
        }
    }
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable description of a loaded model, set once at load time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Input height in pixels
    pub height: u32,
    /// Input width in pixels
    pub width: u32,
    /// Input channel count (always 3)
    pub channels: u32,
    /// Input numeric type
    pub input_kind: InputKind,
    /// Length of the flattened output vector
    pub output_len: usize,
}

impl ModelDescriptor {
    /// Derive a descriptor from the input shape a model declares.
    ///
    /// Accepts `[batch, h, w, c]` (batch is ignored, requests always use 1)
    /// and `[h, w, c]`.
    pub fn from_declared_shape(
        shape: &[usize],
        input_kind: InputKind,
        output_len: usize,
    ) -> Result<Self, DescriptorError> {
        let (height, width, channels) = match *shape {
            [_, h, w, c] => (h, w, c),
            [h, w, c] => (h, w, c),
            _ => return Err(DescriptorError::UnsupportedRank(shape.len())),
        };

        let descriptor = Self {
            height: dimension("height", height)?,
            width: dimension("width", width)?,
            channels: dimension("channels", channels)?,
            input_kind,
            output_len,
        };
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Check the invariants the preprocessor relies on
    pub fn validate(&self) -> Result<(), DescriptorError> {
        if self.height == 0 {
            return Err(DescriptorError::NonPositiveDimension { axis: "height", value: 0 });
        }
        if self.width == 0 {
            return Err(DescriptorError::NonPositiveDimension { axis: "width", value: 0 });
        }
        if self.channels != RGB_CHANNELS {
            return Err(DescriptorError::UnsupportedChannels(self.channels));
        }
        if self.output_len == 0 {
            return Err(DescriptorError::EmptyOutput);
        }
        Ok(())
    }

    /// Full input tensor shape `[1, h, w, c]`
    pub fn input_shape(&self) -> [usize; 4] {
        [1, self.height as usize, self.width as usize, self.channels as usize]
    }

    /// Number of elements in one input tensor
    pub fn input_len(&self) -> usize {
        self.input_shape().iter().product()
    }
}

fn dimension(axis: &'static str, value: usize) -> Result<u32, DescriptorError> {
    if value == 0 {
        return Err(DescriptorError::NonPositiveDimension { axis, value });
    }
    u32::try_from(value).map_err(|_| DescriptorError::DimensionTooLarge { axis, value })
}
