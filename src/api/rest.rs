//! Axum REST API handlers

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use axum::{
    Router,
    routing::{get, post},
    extract::{State, Multipart, DefaultBodyLimit},
    http::StatusCode,
    response::Json,
};
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

use crate::engine::preprocess::decode_image;
use crate::service::AttentionService;

use super::dto::*;

/// Application state shared across handlers
pub struct AppState {
    pub service: Arc<AttentionService>,
    pub start_time: Instant,
    pub frames_analyzed: AtomicU64,
    pub faces_detected: AtomicU64,
}

impl AppState {
    pub fn new(service: Arc<AttentionService>) -> Self {
        Self {
            service,
            start_time: Instant::now(),
            frames_analyzed: AtomicU64::new(0),
            faces_detected: AtomicU64::new(0),
        }
    }
}

/// Create the REST API router
pub fn create_rest_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        // Frame analysis
        .route("/analyze", post(analyze_handler))
        .route("/api/v1/analyze", post(analyze_handler))
        // System endpoints
        .route("/health", get(health_handler))
        .route("/api/v1/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        // Middleware
        .layer(DefaultBodyLimit::max(50 * 1024 * 1024)) // 50MB limit for large frames
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Liveness check used by capture clients
async fn root_handler() -> &'static str {
    "Attention Engine is running."
}

/// Pull the encoded frame bytes out of the multipart form
///
/// The field is `frame`, with `image` accepted as an alias. Missing and
/// zero-length uploads map to distinct 400 codes.
async fn read_frame_field(
    mut multipart: Multipart,
) -> Result<Vec<u8>, (StatusCode, Json<ErrorResponse>)> {
    let mut frame_data: Option<Vec<u8>> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(&e.to_string(), "MULTIPART_ERROR")))
    })? {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "frame" | "image" => {
                frame_data = Some(field.bytes().await.map_err(|e| {
                    (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(&e.to_string(), "READ_ERROR")))
                })?.to_vec());
            }
            _ => {}
        }
    }

    let frame_data = frame_data.ok_or_else(|| {
        (StatusCode::BAD_REQUEST, Json(ErrorResponse::new("No frame provided", "MISSING_FRAME")))
    })?;

    if frame_data.is_empty() {
        return Err((StatusCode::BAD_REQUEST, Json(ErrorResponse::new("Empty frame", "EMPTY_FRAME"))));
    }

    Ok(frame_data)
}

/// Analyze one frame for attention scores
async fn analyze_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<AnalyzeResponse>, (StatusCode, Json<ErrorResponse>)> {
    let frame_data = read_frame_field(multipart).await?;

    // Decode here so malformed uploads stay client errors
    let image = decode_image(&frame_data).map_err(|e| {
        debug!("Frame decode failed: {}", e);
        (StatusCode::BAD_REQUEST, Json(ErrorResponse::new("Failed to decode image", "DECODE_FAILED")))
    })?;

    let result = state.service.analyze(image).await.map_err(|e| {
        error!("Analysis failed: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse::new(&e.to_string(), "ANALYZE_FAILED")))
    })?;

    state.frames_analyzed.fetch_add(1, Ordering::Relaxed);
    if result.face_detected {
        state.faces_detected.fetch_add(1, Ordering::Relaxed);
    }

    Ok(Json(AnalyzeResponse {
        face_conf: result.scores.face_conf,
        gaze_conf: result.scores.gaze_conf,
        head_conf: result.scores.head_conf,
        inference_time_ms: result.inference_time_ms,
    }))
}

/// Health check
async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let health = state.service.health();

    Json(HealthResponse {
        healthy: health.healthy,
        version: health.version,
        models_loaded: health.models_loaded,
    })
}

/// Metrics
async fn metrics_handler(State(state): State<Arc<AppState>>) -> Json<MetricsResponse> {
    let health = state.service.health();
    let uptime = state.start_time.elapsed().as_secs();

    Json(MetricsResponse {
        frames_analyzed: state.frames_analyzed.load(Ordering::Relaxed),
        faces_detected: state.faces_detected.load(Ordering::Relaxed),
        models_loaded: health.models_loaded,
        uptime_seconds: uptime,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::FromRequest;
    use axum::http::Request;

    const BOUNDARY: &str = "frame-test-boundary";

    fn form_with_field(name: &str, data: &str) -> String {
        format!(
            "--{0}\r\n\
             Content-Disposition: form-data; name=\"{1}\"; filename=\"frame.jpg\"\r\n\
             Content-Type: image/jpeg\r\n\
             \r\n\
             {2}\r\n\
             --{0}--\r\n",
            BOUNDARY, name, data
        )
    }

    async fn multipart_from(body: String) -> Multipart {
        let request = Request::builder()
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap();

        Multipart::from_request(request, &()).await.unwrap()
    }

    #[tokio::test]
    async fn test_read_frame_field_returns_frame_bytes() {
        let multipart = multipart_from(form_with_field("frame", "jpeg bytes")).await;

        let data = read_frame_field(multipart).await.unwrap();
        assert_eq!(data, b"jpeg bytes");
    }

    #[tokio::test]
    async fn test_read_frame_field_accepts_image_alias() {
        let multipart = multipart_from(form_with_field("image", "jpeg bytes")).await;

        let data = read_frame_field(multipart).await.unwrap();
        assert_eq!(data, b"jpeg bytes");
    }

    #[tokio::test]
    async fn test_form_without_frame_is_missing_frame() {
        let multipart = multipart_from(form_with_field("note", "hello")).await;

        let (status, Json(err)) = read_frame_field(multipart).await.unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code, "MISSING_FRAME");
        assert_eq!(err.error, "No frame provided");
    }

    #[tokio::test]
    async fn test_zero_byte_frame_is_empty_frame() {
        let multipart = multipart_from(form_with_field("frame", "")).await;

        let (status, Json(err)) = read_frame_field(multipart).await.unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code, "EMPTY_FRAME");
        assert_eq!(err.error, "Empty frame");
    }
}
