//! Classification service

use image_preprocess::{preprocess, MediaType, ModelDescriptor};
use inference_engine::{EngineStatus, InferenceEngine, ModelLoader, OnnxLoader};
use score_ranker::{rank, LabelTable, PredictionResult};
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, error, info, warn};

use crate::{ClassifierSettings, ClassifyError};

/// Snapshot for health reporting
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub engine: EngineStatus,
    pub num_labels: usize,
    pub model_path: String,
    pub top_k: usize,
}

impl ServiceStatus {
    pub fn descriptor(&self) -> Option<&ModelDescriptor> {
        self.engine.descriptor()
    }
}

/// One per process; shared by every request handler.
pub struct ClassificationService {
    settings: ClassifierSettings,
    loader: Arc<dyn ModelLoader>,
    labels: RwLock<Arc<LabelTable>>,
    engine: InferenceEngine,
}

impl ClassificationService {
    /// Create an uninitialized service that loads models through `loader`
    pub fn new(settings: ClassifierSettings, loader: Arc<dyn ModelLoader>) -> Self {
        Self {
            settings,
            loader,
            labels: RwLock::new(Arc::new(LabelTable::empty())),
            engine: InferenceEngine::new(),
        }
    }

    /// Create an uninitialized service backed by the ONNX loader
    pub fn onnx(settings: ClassifierSettings) -> Self {
        Self::new(settings, Arc::new(OnnxLoader))
    }

    pub fn settings(&self) -> &ClassifierSettings {
        &self.settings
    }

    /// Load labels and the model.
    ///
    /// Never fails: a missing label file yields an empty table, and a model
    /// that cannot be loaded leaves the engine in `LoadFailed`. The returned
    /// status says which.
    pub async fn initialize(&self) -> EngineStatus {
        info!("Loading model and labels...");

        let loader = Arc::clone(&self.loader);
        let labels_path = self.settings.labels_path.clone();
        let model_path = self.settings.model_path.clone();

        let loaded = tokio::task::spawn_blocking(move || {
            let labels = LabelTable::load(&labels_path);
            let runtime = loader.load(&model_path);
            (labels, runtime)
        })
        .await;

        let (labels, runtime) = match loaded {
            Ok(pair) => pair,
            Err(e) => {
                error!("Startup loader task failed: {}", e);
                self.engine.mark_failed(format!("loader task failed: {}", e));
                return self.engine.status();
            }
        };

        let labels = labels.unwrap_or_else(|e| {
            warn!("{}; falling back to class_<index> names", e);
            LabelTable::empty()
        });
        let num_labels = labels.len();
        *self.labels.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(labels);

        match runtime {
            Ok(runtime) => {
                let descriptor = self.engine.install(runtime).await;
                if descriptor.output_len != num_labels {
                    warn!(
                        "Model has {} outputs but {} labels are loaded",
                        descriptor.output_len, num_labels
                    );
                }
                info!("Loaded {} labels", num_labels);
            }
            Err(e) => {
                error!(
                    "Failed to load model {}: {}",
                    self.settings.model_path.display(),
                    e
                );
                self.engine.mark_failed(e.to_string());
            }
        }

        self.engine.status()
    }

    /// Classify one uploaded image
    pub async fn classify_request<B>(
        &self,
        bytes: B,
        content_type: &str,
    ) -> Result<PredictionResult, ClassifyError>
    where
        B: AsRef<[u8]> + Send + 'static,
    {
        let media_type = MediaType::from_content_type(content_type)
            .ok_or_else(|| ClassifyError::UnsupportedMediaType(content_type.to_string()))?;

        if bytes.as_ref().is_empty() {
            return Err(ClassifyError::EmptyPayload);
        }

        let descriptor = self
            .engine
            .descriptor()
            .ok_or(ClassifyError::EngineUnavailable)?;

        let tensor = tokio::task::spawn_blocking(move || {
            preprocess(bytes.as_ref(), media_type, &descriptor)
        })
        .await
        .map_err(|e| {
            ClassifyError::InferenceFailure(format!("preprocessing worker aborted: {}", e))
        })??;

        let raw = self.engine.classify(tensor).await?;
        let labels = self.labels();
        let result = rank(&raw, &labels, self.settings.top_k)?;

        debug!(
            "Classified {} upload as {} ({:.3})",
            media_type, result.predicted_label, result.confidence
        );
        Ok(result)
    }

    /// Release the model. Idempotent, safe before `initialize`.
    pub async fn shutdown(&self) {
        if self.engine.shutdown().await {
            info!("Model resources released");
        } else {
            debug!("Shutdown requested with no model loaded");
        }
    }

    /// Current label table
    pub fn labels(&self) -> Arc<LabelTable> {
        Arc::clone(&self.labels.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Engine lifecycle state
    pub fn engine_status(&self) -> EngineStatus {
        self.engine.status()
    }

    /// Health snapshot
    pub fn status(&self) -> ServiceStatus {
        ServiceStatus {
            engine: self.engine.status(),
            num_labels: self.labels().len(),
            model_path: self.settings.model_path.display().to_string(),
            top_k: self.settings.top_k,
        }
    }
}
