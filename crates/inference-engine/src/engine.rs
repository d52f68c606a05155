//! Inference Engine Implementation

use image_preprocess::{InputTensor, ModelDescriptor};
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{InferenceError, ModelRuntime, RawOutput};

/// Lifecycle state of the engine
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EngineStatus {
    /// Startup has not finished loading a model yet
    Uninitialized,
    /// A model is installed and accepting requests
    Ready { descriptor: ModelDescriptor },
    /// Startup tried to load the model and failed
    LoadFailed { reason: String },
    /// The model was released at shutdown
    ShutDown,
}

impl EngineStatus {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineStatus::Uninitialized => "uninitialized",
            EngineStatus::Ready { .. } => "ready",
            EngineStatus::LoadFailed { .. } => "load_failed",
            EngineStatus::ShutDown => "shut_down",
        }
    }

    pub fn descriptor(&self) -> Option<&ModelDescriptor> {
        match self {
            EngineStatus::Ready { descriptor } => Some(descriptor),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, EngineStatus::Ready { .. })
    }
}

/// Serialized access to one model runtime.
///
/// The runtime sits behind a FIFO-fair async mutex; the forward pass itself
/// runs on a blocking worker while the lock is held, so concurrent requests
/// are served one at a time in arrival order without stalling the executor.
pub struct InferenceEngine {
    runtime: Arc<Mutex<Option<Box<dyn ModelRuntime>>>>,
    status: RwLock<EngineStatus>,
}

impl InferenceEngine {
    /// Create an engine with no model installed
    pub fn new() -> Self {
        Self {
            runtime: Arc::new(Mutex::new(None)),
            status: RwLock::new(EngineStatus::Uninitialized),
        }
    }

    /// Install a loaded runtime and mark the engine ready
    pub async fn install(&self, runtime: Box<dyn ModelRuntime>) -> ModelDescriptor {
        let descriptor = runtime.descriptor();
        let mut slot = self.runtime.lock().await;
        *slot = Some(runtime);
        self.set_status(EngineStatus::Ready { descriptor });
        info!(
            "Inference engine ready: {}x{}x{} {}, {} outputs",
            descriptor.height,
            descriptor.width,
            descriptor.channels,
            descriptor.input_kind,
            descriptor.output_len
        );
        descriptor
    }

    /// Record a failed model load; the engine stays unavailable.
    ///
    /// Ignored once the engine has been shut down.
    pub fn mark_failed(&self, reason: impl Into<String>) {
        let mut status = self.status.write().unwrap_or_else(PoisonError::into_inner);
        if *status == EngineStatus::ShutDown {
            debug!("Ignoring load failure reported after shutdown");
            return;
        }
        *status = EngineStatus::LoadFailed {
            reason: reason.into(),
        };
    }

    /// Current lifecycle state
    pub fn status(&self) -> EngineStatus {
        self.status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Descriptor of the installed model, if ready
    pub fn descriptor(&self) -> Option<ModelDescriptor> {
        self.status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .descriptor()
            .copied()
    }

    /// Check if a model is installed
    pub fn is_ready(&self) -> bool {
        self.descriptor().is_some()
    }

    /// Run one forward pass.
    ///
    /// Fails with `EngineUnavailable` before `install` or after `shutdown`.
    pub async fn classify(&self, tensor: InputTensor) -> Result<RawOutput, InferenceError> {
        let descriptor = self.descriptor().ok_or(InferenceError::EngineUnavailable)?;

        let expected = descriptor.input_shape();
        if tensor.shape() != expected || tensor.kind() != descriptor.input_kind {
            return Err(InferenceError::InvalidInputShape {
                expected: format!("{:?} {}", expected, descriptor.input_kind),
                actual: format!("{:?} {}", tensor.shape(), tensor.kind()),
            });
        }

        let mut slot = Arc::clone(&self.runtime).lock_owned().await;
        if slot.is_none() {
            return Err(InferenceError::EngineUnavailable);
        }

        // The guard moves into the worker so the lock is held until the
        // forward pass ends, even if the calling request is dropped.
        let output = tokio::task::spawn_blocking(move || {
            let runtime = slot.as_mut().ok_or(InferenceError::EngineUnavailable)?;
            let start = Instant::now();
            let output = runtime.invoke(&tensor)?;
            debug!("Inference completed in {}ms", start.elapsed().as_millis());
            Ok::<_, InferenceError>(output)
        })
        .await
        .map_err(|e| {
            InferenceError::InferenceFailed(format!("inference worker aborted: {}", e))
        })??;

        if output.len() != descriptor.output_len {
            warn!(
                "Model returned {} outputs, descriptor declares {}",
                output.len(),
                descriptor.output_len
            );
        }

        Ok(output)
    }

    /// Release the runtime. Idempotent; waits for an in-flight forward pass.
    ///
    /// Returns whether a runtime was released.
    pub async fn shutdown(&self) -> bool {
        let mut slot = self.runtime.lock().await;
        let released = slot.take().is_some();
        self.set_status(EngineStatus::ShutDown);
        if released {
            info!("Inference engine released");
        }
        released
    }

    fn set_status(&self, status: EngineStatus) {
        *self.status.write().unwrap_or_else(PoisonError::into_inner) = status;
    }
}

impl Default for InferenceEngine {
    fn default() -> Self {
        Self::new()
    }
}
