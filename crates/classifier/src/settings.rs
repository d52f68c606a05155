//! Classifier settings

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use score_ranker::DEFAULT_TOP_K;

/// Invalid classifier settings
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    #[error("classifier.top_k must be at least 1")]
    ZeroTopK,

    #[error("classifier.model_path must not be empty")]
    EmptyModelPath,
}

/// Classifier configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
    /// ONNX model artifact
    pub model_path: PathBuf,

    /// Line-delimited label file, one class per line in output order
    pub labels_path: PathBuf,

    /// Number of ranked predictions returned per request
    pub top_k: usize,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("assets/model.onnx"),
            labels_path: PathBuf::from("assets/labels.txt"),
            top_k: DEFAULT_TOP_K,
        }
    }
}

impl ClassifierSettings {
    /// Check values that cannot be fixed up at request time
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.top_k == 0 {
            return Err(SettingsError::ZeroTopK);
        }
        if self.model_path.as_os_str().is_empty() {
            return Err(SettingsError::EmptyModelPath);
        }
        Ok(())
    }
}
