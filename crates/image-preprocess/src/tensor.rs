//! Model input tensor

use ndarray::Array4;

use crate::InputKind;

/// NHWC input tensor of shape `[1, h, w, c]`, owned by one request
#[derive(Debug, Clone, PartialEq)]
pub enum InputTensor {
    Float32(Array4<f32>),
    Uint8(Array4<u8>),
}

impl InputTensor {
    /// Tensor shape `[n, h, w, c]`
    pub fn shape(&self) -> [usize; 4] {
        let (n, h, w, c) = match self {
            InputTensor::Float32(a) => a.dim(),
            InputTensor::Uint8(a) => a.dim(),
        };
        [n, h, w, c]
    }

    /// Element type
    pub fn kind(&self) -> InputKind {
        match self {
            InputTensor::Float32(_) => InputKind::Float32,
            InputTensor::Uint8(_) => InputKind::Uint8,
        }
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.shape().iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Values widened to `f32`, in standard (row-major) order
    pub fn to_f32_vec(&self) -> Vec<f32> {
        match self {
            InputTensor::Float32(a) => a.iter().copied().collect(),
            InputTensor::Uint8(a) => a.iter().map(|&v| v as f32).collect(),
        }
    }

    /// Mean value of each channel, used for logging and test doubles
    pub fn channel_means(&self) -> Vec<f32> {
        let [_, h, w, c] = self.shape();
        let pixels = (h * w).max(1) as f32;
        let mut sums = vec![0.0f32; c];
        for (i, v) in self.to_f32_vec().into_iter().enumerate() {
            sums[i % c] += v;
        }
        sums.into_iter().map(|s| s / pixels).collect()
    }
}
