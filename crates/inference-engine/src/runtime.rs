//! Model runtime seam

use image_preprocess::{InputTensor, ModelDescriptor};
use std::path::Path;

use crate::InferenceError;

/// Flattened first output tensor of a forward pass
pub type RawOutput = Vec<f32>;

/// A loaded model that can run one forward pass at a time.
///
/// `invoke` takes `&mut self`: bind input, run and read output form one
/// sequence that must not interleave with another call.
pub trait ModelRuntime: Send {
    /// Geometry and dtype the model declared at load time
    fn descriptor(&self) -> ModelDescriptor;

    /// Bind `input`, run the forward pass and read the output vector
    fn invoke(&mut self, input: &InputTensor) -> Result<RawOutput, InferenceError>;
}

/// Loads a model artifact from disk
pub trait ModelLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<Box<dyn ModelRuntime>, InferenceError>;
}
