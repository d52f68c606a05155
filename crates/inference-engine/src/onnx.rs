//! ONNX runtime backed by tract

use image_preprocess::{InputKind, InputTensor, ModelDescriptor};
use std::path::Path;
use tract_core::internal::DimLike;
use tract_core::prelude::DatumType;
use tract_onnx::pb::ModelProto;
use tract_onnx::prelude::*;
use tracing::{error, info};

use crate::{InferenceError, ModelLoader, ModelRuntime, RawOutput};

type OnnxPlan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Loads NHWC ONNX classifiers with tract
#[derive(Debug, Clone, Copy, Default)]
pub struct OnnxLoader;

impl ModelLoader for OnnxLoader {
    fn load(&self, path: &Path) -> Result<Box<dyn ModelRuntime>, InferenceError> {
        let runtime = OnnxRuntime::load(path)?;
        Ok(Box::new(runtime))
    }
}

/// Optimized tract plan plus the descriptor derived from its declared input
pub struct OnnxRuntime {
    plan: OnnxPlan,
    descriptor: ModelDescriptor,
    /// Concrete shape the plan was built for: `[1,h,w,c]` or `[h,w,c]`
    input_shape: TVec<usize>,
}

impl OnnxRuntime {
    /// Load and optimize the model at `path`.
    ///
    /// A symbolic batch axis is pinned to 1; any other symbolic axis, a
    /// non-RGB channel count, or an input type other than f32/u8 is rejected.
    pub fn load(path: &Path) -> Result<Self, InferenceError> {
        info!("Loading ONNX model from {}", path.display());

        let model = tract_onnx::onnx().model_for_path(path).map_err(|e| {
            error!("Failed to read model {}: {}", path.display(), e);
            load_error(e)
        })?;
        Self::from_model(model)
    }

    /// Build a runtime from an already-decoded ONNX protobuf
    pub fn from_proto(proto: &ModelProto) -> Result<Self, InferenceError> {
        let model = tract_onnx::onnx()
            .model_for_proto_model(proto)
            .map_err(load_error)?;
        Self::from_model(model)
    }

    fn from_model(model: InferenceModel) -> Result<Self, InferenceError> {
        let declared = model.clone().into_typed().map_err(load_error)?;
        let fact = declared.input_fact(0).map_err(load_error)?.clone();
        let input_kind = input_kind_for(fact.datum_type)?;

        let rank = fact.rank();
        let dims = fact
            .shape
            .iter()
            .enumerate()
            .map(|(axis, dim)| match dim.to_usize() {
                Ok(value) => Ok(value),
                Err(_) if rank == 4 && axis == 0 => Ok(1),
                Err(_) => Err(InferenceError::ModelLoadError(format!(
                    "input axis {} is symbolic ({})",
                    axis, dim
                ))),
            })
            .collect::<Result<Vec<usize>, _>>()?;

        let mut concrete: TVec<usize> = dims.iter().copied().collect();
        if rank == 4 {
            concrete[0] = 1;
        }

        let plan = model
            .with_input_fact(0, InferenceFact::dt_shape(fact.datum_type, concrete.clone()))
            .and_then(|m| m.into_optimized())
            .and_then(|m| m.into_runnable())
            .map_err(load_error)?;

        let output_fact = plan.model().output_fact(0).map_err(load_error)?;
        let output_len: usize = output_fact
            .shape
            .as_concrete()
            .map(|shape| shape.iter().product())
            .ok_or_else(|| {
                InferenceError::ModelLoadError(format!(
                    "output shape {:?} is not concrete",
                    output_fact.shape
                ))
            })?;

        let descriptor = ModelDescriptor::from_declared_shape(&dims, input_kind, output_len)?;
        info!(
            "Model loaded: input {:?} ({}), {} outputs",
            dims, input_kind, output_len
        );

        Ok(Self {
            plan,
            descriptor,
            input_shape: concrete,
        })
    }
}

impl ModelRuntime for OnnxRuntime {
    fn descriptor(&self) -> ModelDescriptor {
        self.descriptor
    }

    fn invoke(&mut self, input: &InputTensor) -> Result<RawOutput, InferenceError> {
        // The input is always NHWC with a batch of one; a model declared
        // without a batch axis gets the same data under its own shape.
        let shape = input.shape();
        let target = &self.input_shape;
        let tensor = match input {
            InputTensor::Float32(a) => {
                let data = a.as_slice().ok_or_else(|| not_contiguous(&shape))?;
                Tensor::from_shape(target, data)
            }
            InputTensor::Uint8(a) => {
                let data = a.as_slice().ok_or_else(|| not_contiguous(&shape))?;
                Tensor::from_shape(target, data)
            }
        }
        .map_err(run_error)?;

        let outputs = self.plan.run(tvec!(tensor.into())).map_err(run_error)?;
        let first = outputs.first().ok_or_else(|| {
            InferenceError::InferenceFailed("model produced no outputs".to_string())
        })?;

        let values = first.cast_to::<f32>().map_err(run_error)?;
        let slice = values.as_slice::<f32>().map_err(run_error)?;
        Ok(slice.to_vec())
    }
}

/// Map a declared tensor type onto the supported input kinds
fn input_kind_for(datum_type: DatumType) -> Result<InputKind, InferenceError> {
    match datum_type {
        DatumType::F32 => Ok(InputKind::Float32),
        DatumType::U8 => Ok(InputKind::Uint8),
        other => Err(InferenceError::UnsupportedInputType(format!("{:?}", other))),
    }
}

fn load_error(e: impl std::fmt::Display) -> InferenceError {
    InferenceError::ModelLoadError(e.to_string())
}

fn run_error(e: impl std::fmt::Display) -> InferenceError {
    InferenceError::InferenceFailed(e.to_string())
}

fn not_contiguous(shape: &[usize; 4]) -> InferenceError {
    InferenceError::InvalidInputShape {
        expected: "contiguous NHWC tensor".to_string(),
        actual: format!("non-contiguous {:?}", shape),
    }
}
