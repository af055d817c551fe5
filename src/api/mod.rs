//! HTTP API
//!
//! REST endpoints:
//! - POST /v1/projects/{id}/images - Upload and index an image
//! - GET /v1/projects/{id}/images - List a project's images
//! - POST /v1/projects/{id}/images/search - Text search
//! - GET /v1/projects/{id}/images/{image_id} - Image metadata
//! - GET /v1/projects/{id}/images/{image_id}/file - Redirect to the blob
//! - DELETE /v1/projects/{id}/images/{image_id} - Delete an image
//! - DELETE /v1/projects/{id} - Delete a project
//! - GET /health - Health check
//!
//! Errors are JSON bodies `{"code": ..., "error": ...}` with stable codes.

use crate::config::ApiConfig;
use crate::defaults::DEFAULT_SEARCH_LIMIT;
use crate::engine::{SearchEngine, SearchHit};
use crate::error::IrisError;
use crate::metadata::ItemRecord;
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::Redirect,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// API state
pub struct ApiState {
    pub engine: Arc<SearchEngine>,
}

/// Build the router (exposed for tests)
pub fn router(engine: Arc<SearchEngine>, max_upload_bytes: u64) -> Router {
    let state = Arc::new(ApiState { engine });

    // Leave headroom for the multipart framing around the file itself
    let body_limit = max_upload_bytes as usize + 64 * 1024;

    Router::new()
        .route("/health", get(health))
        .route(
            "/v1/projects/:project_id/images",
            post(upload_image).get(list_images),
        )
        .route("/v1/projects/:project_id/images/search", post(search_images))
        .route(
            "/v1/projects/:project_id/images/:image_id",
            get(get_image).delete(delete_image),
        )
        .route(
            "/v1/projects/:project_id/images/:image_id/file",
            get(get_image_file),
        )
        .route("/v1/projects/:project_id", delete(delete_project))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the API
pub async fn serve(
    engine: Arc<SearchEngine>,
    config: ApiConfig,
    max_upload_bytes: u64,
) -> anyhow::Result<()> {
    let app = router(engine, max_upload_bytes);

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// HANDLERS
// ============================================================================

/// Health check
async fn health(State(_state): State<Arc<ApiState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Upload and index an image (multipart field "file")
async fn upload_image(
    Path(project_id): Path<String>,
    State(state): State<Arc<ApiState>>,
    mut multipart: Multipart,
) -> Result<Json<ImageResponse>, ApiError> {
    let start = Instant::now();

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {e}")))?
    {
        if field.name() == Some("file") {
            let filename = field.file_name().map(str::to_string);
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {e}")))?;
            upload = Some((filename, content_type, data));
            break;
        }
    }

    let Some((filename, content_type, data)) = upload else {
        return Err(ApiError::BadRequest("Missing multipart field 'file'".into()));
    };

    let record = state
        .engine
        .upload(&project_id, filename.as_deref(), &content_type, data)
        .await?;

    let elapsed = start.elapsed();
    tracing::debug!(
        project_id = %project_id,
        latency_ms = elapsed.as_secs_f64() * 1000.0,
        "Upload handled"
    );

    Ok(Json(ImageResponse::from(record)))
}

/// List a project's images in upload order
async fn list_images(
    Path(project_id): Path<String>,
    State(state): State<Arc<ApiState>>,
) -> Result<Json<ListResponse>, ApiError> {
    let records = state.engine.list(&project_id)?;
    Ok(Json(ListResponse {
        images: records.into_iter().map(ImageResponse::from).collect(),
    }))
}

/// Search a project with a free-text query
async fn search_images(
    Path(project_id): Path<String>,
    State(state): State<Arc<ApiState>>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let start = Instant::now();

    if request.query.trim().is_empty() {
        return Err(ApiError::BadRequest("Query must not be empty".into()));
    }
    let limit = request.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);

    let hits = state.engine.search(&project_id, &request.query, limit).await?;

    let elapsed = start.elapsed();

    Ok(Json(SearchResponse {
        results: hits.into_iter().map(SearchHitResponse::from).collect(),
        latency_ms: elapsed.as_secs_f64() * 1000.0,
    }))
}

/// Image metadata
async fn get_image(
    Path((project_id, image_id)): Path<(String, String)>,
    State(state): State<Arc<ApiState>>,
) -> Result<Json<ImageResponse>, ApiError> {
    let record = state.engine.get(&project_id, &image_id)?;
    Ok(Json(ImageResponse::from(record)))
}

/// Redirect to a presigned URL for the image blob
async fn get_image_file(
    Path((project_id, image_id)): Path<(String, String)>,
    State(state): State<Arc<ApiState>>,
) -> Result<Redirect, ApiError> {
    let (_record, url) = state.engine.presign(&project_id, &image_id).await?;
    Ok(Redirect::temporary(&url))
}

/// Delete an image
async fn delete_image(
    Path((project_id, image_id)): Path<(String, String)>,
    State(state): State<Arc<ApiState>>,
) -> Result<StatusCode, ApiError> {
    state.engine.delete(&project_id, &image_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Delete a project and everything in it
async fn delete_project(
    Path(project_id): Path<String>,
    State(state): State<Arc<ApiState>>,
) -> Result<StatusCode, ApiError> {
    state.engine.delete_project(&project_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// REQUEST/RESPONSE TYPES
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Serialize)]
struct ImageResponse {
    id: String,
    project_id: String,
    filename: Option<String>,
    content_type: String,
    size_bytes: u64,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<ItemRecord> for ImageResponse {
    fn from(record: ItemRecord) -> Self {
        Self {
            id: record.id,
            project_id: record.project_id,
            filename: record.original_filename,
            content_type: record.content_type,
            size_bytes: record.size_bytes,
            created_at: record.created_at,
        }
    }
}

#[derive(Serialize)]
struct ListResponse {
    images: Vec<ImageResponse>,
}

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    limit: Option<usize>,
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<SearchHitResponse>,
    latency_ms: f64,
}

#[derive(Serialize)]
struct SearchHitResponse {
    #[serde(flatten)]
    image: ImageResponse,
    score: f32,
}

impl From<SearchHit> for SearchHitResponse {
    fn from(hit: SearchHit) -> Self {
        Self {
            image: ImageResponse::from(hit.record),
            score: hit.score,
        }
    }
}

// ============================================================================
// ERROR HANDLING
// ============================================================================

#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    Engine(IrisError),
}

impl From<IrisError> for ApiError {
    fn from(e: IrisError) -> Self {
        ApiError::Engine(e)
    }
}

impl ApiError {
    /// Map to an HTTP status and a stable machine-readable code
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            ApiError::Engine(err) => match err {
                IrisError::InvalidProject(_) => (StatusCode::BAD_REQUEST, "INVALID_PROJECT"),
                IrisError::ProjectNotFound { .. } => (StatusCode::NOT_FOUND, "PROJECT_NOT_FOUND"),
                IrisError::ItemNotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                IrisError::InvalidItemId(_) => (StatusCode::BAD_REQUEST, "INVALID_ID"),
                IrisError::UnsupportedContentType(_) => (StatusCode::BAD_REQUEST, "INVALID_IMAGE"),
                IrisError::EmptyUpload => (StatusCode::BAD_REQUEST, "EMPTY_FILE"),
                IrisError::UploadTooLarge { .. } => {
                    (StatusCode::PAYLOAD_TOO_LARGE, "FILE_TOO_LARGE")
                }
                IrisError::CapacityExceeded { .. } => (StatusCode::CONFLICT, "CAPACITY_EXCEEDED"),
                IrisError::EmbeddingFailed(_) => (StatusCode::BAD_GATEWAY, "INFERENCE_FAILED"),
                IrisError::Storage(_) => (StatusCode::BAD_GATEWAY, "STORAGE_FAILED"),
                IrisError::DimensionMismatch { .. }
                | IrisError::Config(_)
                | IrisError::Io(_)
                | IrisError::Serialization(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL")
                }
            },
        }
    }
}

impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, code) = self.status_and_code();
        let message = match &self {
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::Engine(err) => err.to_string(),
        };

        if status.is_server_error() {
            tracing::error!(code, error = %message, "Request failed");
        }

        let body = serde_json::json!({
            "code": code,
            "error": message,
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let cases = [
            (
                ApiError::Engine(IrisError::invalid_project("bad")),
                StatusCode::BAD_REQUEST,
                "INVALID_PROJECT",
            ),
            (
                ApiError::Engine(IrisError::project_not_found("p")),
                StatusCode::NOT_FOUND,
                "PROJECT_NOT_FOUND",
            ),
            (
                ApiError::Engine(IrisError::item_not_found("i")),
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
            ),
            (
                ApiError::Engine(IrisError::EmptyUpload),
                StatusCode::BAD_REQUEST,
                "EMPTY_FILE",
            ),
            (
                ApiError::Engine(IrisError::UploadTooLarge { limit: 1 }),
                StatusCode::PAYLOAD_TOO_LARGE,
                "FILE_TOO_LARGE",
            ),
            (
                ApiError::Engine(IrisError::CapacityExceeded {
                    project_id: "p".into(),
                    capacity: 1,
                }),
                StatusCode::CONFLICT,
                "CAPACITY_EXCEEDED",
            ),
            (
                ApiError::Engine(IrisError::embedding_failed("down")),
                StatusCode::BAD_GATEWAY,
                "INFERENCE_FAILED",
            ),
        ];

        for (err, status, code) in cases {
            assert_eq!(err.status_and_code(), (status, code));
        }
    }
}
