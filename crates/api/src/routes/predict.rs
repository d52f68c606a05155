//! Prediction Route

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    Json,
};
use classifier::PredictionResult;
use metrics::{counter, histogram};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info_span, warn, Instrument};
use uuid::Uuid;

use crate::{error::ApiError, AppState};

/// Multipart field carrying the image
pub const FILE_FIELD: &str = "file";

/// Classify one uploaded image
pub async fn post_predict(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictionResult>, ApiError> {
    let span = info_span!("predict", request_id = %Uuid::new_v4());

    async move {
        let started = Instant::now();
        let result = classify_upload(&state, multipart).await;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.code(),
        };
        counter!("classifier_predict_requests_total", "outcome" => outcome).increment(1);
        histogram!("classifier_predict_duration_seconds").record(started.elapsed().as_secs_f64());

        match &result {
            Ok(prediction) => debug!(
                "Predicted {} ({:.3}) in {:?}",
                prediction.predicted_label,
                prediction.confidence,
                started.elapsed()
            ),
            Err(e) if e.status().is_server_error() => warn!("Prediction failed: {}", e),
            Err(e) => debug!("Rejected upload: {}", e),
        }

        result.map(Json)
    }
    .instrument(span)
    .await
}

async fn classify_upload(
    state: &AppState,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<PredictionResult, ApiError> {
    let mut multipart = multipart?;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let content_type = field.content_type().unwrap_or_default().to_string();
        let bytes = field.bytes().await?;
        debug!("Received {} bytes as {:?}", bytes.len(), content_type);

        return Ok(state.service.classify_request(bytes, &content_type).await?);
    }

    Err(ApiError::MissingFile)
}
