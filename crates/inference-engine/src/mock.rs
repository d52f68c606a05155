//! Mock runtime for development and tests
//!
//! Produces deterministic logits from the per-channel mean of the input, so
//! solid red/green/blue images classify as output 0/1/2. Overlapping calls
//! are detected and reported as failures.

use image_preprocess::{InputKind, InputTensor, ModelDescriptor};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::{InferenceError, ModelLoader, ModelRuntime, RawOutput};

#[derive(Debug, Clone)]
enum Behavior {
    ChannelMeans,
    Fixed(Vec<f32>),
    Fail(String),
}

/// Deterministic stand-in for a real model
#[derive(Debug, Clone)]
pub struct MockRuntime {
    descriptor: ModelDescriptor,
    behavior: Behavior,
    delay: Duration,
    in_flight: Arc<AtomicBool>,
    invocations: Arc<AtomicUsize>,
}

impl MockRuntime {
    pub fn new(descriptor: ModelDescriptor) -> Self {
        Self {
            descriptor,
            behavior: Behavior::ChannelMeans,
            delay: Duration::ZERO,
            in_flight: Arc::new(AtomicBool::new(false)),
            invocations: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Always return `output`
    pub fn with_output(mut self, output: Vec<f32>) -> Self {
        self.behavior = Behavior::Fixed(output);
        self
    }

    /// Hold each forward pass for `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail every forward pass with `reason`
    pub fn failing(mut self, reason: impl Into<String>) -> Self {
        self.behavior = Behavior::Fail(reason.into());
        self
    }

    /// Counter of completed `invoke` calls, shared with clones
    pub fn invocations(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.invocations)
    }

    fn logits(&self, input: &InputTensor) -> RawOutput {
        let scale = match input.kind() {
            InputKind::Float32 => 1.0,
            InputKind::Uint8 => 255.0,
        };
        let means: Vec<f32> = input.channel_means().into_iter().map(|m| m / scale).collect();
        (0..self.descriptor.output_len)
            .map(|i| 10.0 * means[i % means.len()] - 0.01 * i as f32)
            .collect()
    }
}

impl ModelRuntime for MockRuntime {
    fn descriptor(&self) -> ModelDescriptor {
        self.descriptor
    }

    fn invoke(&mut self, input: &InputTensor) -> Result<RawOutput, InferenceError> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return Err(InferenceError::InferenceFailed(
                "mock runtime entered concurrently".to_string(),
            ));
        }

        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }

        let result = match &self.behavior {
            Behavior::ChannelMeans => Ok(self.logits(input)),
            Behavior::Fixed(output) => Ok(output.clone()),
            Behavior::Fail(reason) => Err(InferenceError::InferenceFailed(reason.clone())),
        };

        self.in_flight.store(false, Ordering::SeqCst);
        self.invocations.fetch_add(1, Ordering::SeqCst);
        debug!("Mock forward pass: {:?}", result.as_ref().map(Vec::len));
        result
    }
}

/// Loader handing out clones of a template [`MockRuntime`]
#[derive(Debug, Clone)]
pub struct MockLoader {
    template: Result<MockRuntime, String>,
    delay: Duration,
    loads: Arc<AtomicUsize>,
}

impl MockLoader {
    pub fn new(runtime: MockRuntime) -> Self {
        Self {
            template: Ok(runtime),
            delay: Duration::ZERO,
            loads: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Loader whose every load fails with `reason`
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            template: Err(reason.into()),
            delay: Duration::ZERO,
            loads: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Hold each load for `delay`, to observe requests racing startup
    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of load attempts so far
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl ModelLoader for MockLoader {
    fn load(&self, path: &Path) -> Result<Box<dyn ModelRuntime>, InferenceError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        match &self.template {
            Ok(runtime) => {
                debug!("Mock model loaded for {}", path.display());
                Ok(Box::new(runtime.clone()))
            }
            Err(reason) => Err(InferenceError::ModelLoadError(format!(
                "{}: {}",
                path.display(),
                reason
            ))),
        }
    }
}
