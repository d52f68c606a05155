//! Health Route

use axum::{extract::State, Json};
use classifier::ServiceStatus;
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub version: String,
    pub uptime_seconds: u64,
    pub engine: EngineHealth,
    pub model_info: ModelInfo,
    pub num_labels: usize,
}

/// Engine lifecycle state
#[derive(Debug, Serialize)]
pub struct EngineHealth {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Loaded model geometry; geometry fields are null until a model is installed
#[derive(Debug, Serialize)]
pub struct ModelInfo {
    pub height: Option<u32>,
    pub width: Option<u32>,
    pub channels: Option<u32>,
    pub dtype: Option<&'static str>,
    pub num_labels: usize,
    pub model_path: String,
    pub top_k: usize,
}

impl From<&ServiceStatus> for ModelInfo {
    fn from(status: &ServiceStatus) -> Self {
        let descriptor = status.descriptor();
        Self {
            height: descriptor.map(|d| d.height),
            width: descriptor.map(|d| d.width),
            channels: descriptor.map(|d| d.channels),
            dtype: descriptor.map(|d| d.input_kind.as_str()),
            num_labels: status.num_labels,
            model_path: status.model_path.clone(),
            top_k: status.top_k,
        }
    }
}

/// Liveness and model status. Always 200, even while the model is loading.
pub async fn get_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let status = state.service.status();

    let reason = match &status.engine {
        classifier::EngineStatus::LoadFailed { reason } => Some(reason.clone()),
        _ => None,
    };

    Json(HealthResponse {
        status: "ok",
        message: "Pet disease classifier API",
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        engine: EngineHealth {
            status: status.engine.as_str(),
            reason,
        },
        model_info: ModelInfo::from(&status),
        num_labels: status.num_labels,
    })
}
