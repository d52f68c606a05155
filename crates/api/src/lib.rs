//! Pet Disease Classifier API Server
//!
//! HTTP surface for the classification service: a health endpoint, the
//! multipart prediction endpoint and Prometheus metrics.

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use classifier::ClassificationService;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use std::time::Instant;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;

pub mod config;
pub mod error;
pub mod routes;

pub use config::{AppConfig, ConfigError, LoggingConfig, MetricsConfig, ServerConfig};
pub use error::ApiError;

/// Application state shared across handlers
pub struct AppState {
    /// Classification service
    pub service: Arc<ClassificationService>,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: Instant,
    /// Prometheus handle, when metrics are enabled
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create new application state
    pub fn new(service: Arc<ClassificationService>, metrics: Option<PrometheusHandle>) -> Self {
        Self {
            service,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: Instant::now(),
            metrics,
        }
    }
}

/// Create the application router
pub fn create_router(state: Arc<AppState>, server: &ServerConfig) -> Router {
    let router = Router::new()
        .route("/", get(routes::health::get_health))
        .route("/predict", post(routes::predict::post_predict))
        .route("/metrics", get(routes::metrics::get_metrics))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(server.max_upload_bytes)),
        );

    let router = if server.cors_permissive {
        router.layer(CorsLayer::permissive())
    } else {
        router
    };

    router.with_state(state)
}

/// Initialize logging
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let builder = FmtSubscriber::builder()
        .with_max_level(config.max_level()?)
        .with_target(true);

    let installed = if config.json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };

    installed.context("Failed to set tracing subscriber")
}

/// Run the server until Ctrl-C or SIGTERM.
///
/// The model loads in the background; `/` answers immediately and
/// `/predict` returns 503 until the engine is ready.
pub async fn run_server(config: AppConfig) -> anyhow::Result<()> {
    let addr = config.bind_addr()?;

    let metrics = if config.metrics.enabled {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("Failed to install Prometheus recorder")?;
        Some(handle)
    } else {
        None
    };

    let service = Arc::new(ClassificationService::onnx(config.classifier.clone()));
    let state = Arc::new(AppState::new(Arc::clone(&service), metrics));
    let app = create_router(state, &config.server);

    let init = {
        let service = Arc::clone(&service);
        tokio::spawn(async move {
            let status = service.initialize().await;
            info!("Engine status after startup: {}", status.as_str());
        })
    };

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Starting API server on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    init.abort();
    service.shutdown().await;
    info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use classifier::{ClassifierSettings, InputKind, ModelDescriptor};
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use inference_engine::mock::{MockLoader, MockRuntime};
    use serde_json::Value;
    use std::io::Cursor;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    const BOUNDARY: &str = "petvision-test-boundary";

    fn descriptor() -> ModelDescriptor {
        ModelDescriptor {
            height: 64,
            width: 64,
            channels: 3,
            input_kind: InputKind::Float32,
            output_len: 3,
        }
    }

    fn jpeg() -> Vec<u8> {
        let img = RgbImage::from_pixel(120, 90, Rgb([255, 0, 0]));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, ImageFormat::Jpeg)
            .unwrap();
        buf.into_inner()
    }

    fn multipart_body(field: &str, content_type: &str, bytes: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        let head = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"{field}\"; filename=\"upload\"\r\n\
             Content-Type: {content_type}\r\n\r\n"
        );
        body.extend_from_slice(head.as_bytes());
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn predict_request(body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/predict")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    struct Harness {
        service: Arc<ClassificationService>,
        router: Router,
        invocations: Arc<AtomicUsize>,
    }

    fn harness_with(server: ServerConfig) -> Harness {
        let runtime = MockRuntime::new(descriptor());
        let invocations = runtime.invocations();
        let settings = ClassifierSettings {
            model_path: PathBuf::from("model.onnx"),
            labels_path: PathBuf::from("/nonexistent/labels.txt"),
            top_k: 2,
        };
        let service = Arc::new(ClassificationService::new(
            settings,
            Arc::new(MockLoader::new(runtime)),
        ));
        let state = Arc::new(AppState::new(Arc::clone(&service), None));
        let router = create_router(state, &server);
        Harness {
            service,
            router,
            invocations,
        }
    }

    fn harness() -> Harness {
        harness_with(ServerConfig::default())
    }

    async fn json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_before_initialize() {
        let h = harness();
        let response = h
            .router
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["engine"]["status"], "uninitialized");
        assert!(body["model_info"]["height"].is_null());
        assert!(body["model_info"]["dtype"].is_null());
        assert_eq!(body["model_info"]["top_k"], 2);
    }

    #[tokio::test]
    async fn test_health_after_initialize() {
        let h = harness();
        h.service.initialize().await;

        let response = h
            .router
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = json(response).await;
        assert_eq!(body["engine"]["status"], "ready");
        assert_eq!(body["model_info"]["height"], 64);
        assert_eq!(body["model_info"]["channels"], 3);
        assert_eq!(body["model_info"]["dtype"], "float32");
        assert_eq!(body["num_labels"], 0);
    }

    #[tokio::test]
    async fn test_predict_before_initialize_is_503() {
        let h = harness();
        let response = h
            .router
            .oneshot(predict_request(multipart_body("file", "image/jpeg", &jpeg())))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json(response).await["error"], "engine_unavailable");
    }

    #[tokio::test]
    async fn test_predict_after_initialize() {
        let h = harness();
        h.service.initialize().await;

        let response = h
            .router
            .oneshot(predict_request(multipart_body("file", "image/jpeg", &jpeg())))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["predicted_disease"], "class_0");
        assert_eq!(body["top_k"].as_array().unwrap().len(), 2);
        assert_eq!(body["top_k"][0]["index"], 0);
        assert_eq!(body["num_labels"], 0);
        assert_eq!(h.invocations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_text_upload_is_415_without_inference() {
        let h = harness();
        h.service.initialize().await;

        let response = h
            .router
            .oneshot(predict_request(multipart_body("file", "text/plain", b"hello")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(json(response).await["error"], "unsupported_media_type");
        assert_eq!(h.invocations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_and_corrupt_uploads_are_400() {
        let h = harness();
        h.service.initialize().await;

        let response = h
            .router
            .clone()
            .oneshot(predict_request(multipart_body("file", "image/png", b"")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json(response).await["error"], "empty_payload");

        let response = h
            .router
            .oneshot(predict_request(multipart_body(
                "file",
                "image/jpeg",
                b"definitely not a jpeg",
            )))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json(response).await["error"], "invalid_image");
        assert_eq!(h.invocations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_file_field_is_422() {
        let h = harness();
        h.service.initialize().await;

        let response = h
            .router
            .oneshot(predict_request(multipart_body("image", "image/jpeg", &jpeg())))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json(response).await["error"], "missing_file");
    }

    #[tokio::test]
    async fn test_non_multipart_body_is_400() {
        let h = harness();
        let request = Request::builder()
            .method("POST")
            .uri("/predict")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();

        let response = h.router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json(response).await["error"], "malformed_upload");
    }

    #[tokio::test]
    async fn test_oversized_upload_is_413() {
        let h = harness_with(ServerConfig {
            max_upload_bytes: 1024,
            ..Default::default()
        });
        h.service.initialize().await;

        let response = h
            .router
            .oneshot(predict_request(multipart_body(
                "file",
                "image/jpeg",
                &vec![0u8; 8 * 1024],
            )))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(h.invocations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_metrics_disabled_is_404() {
        let h = harness();
        let response = h
            .router
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
