//! HTTP routes

use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{header, HeaderValue, Method};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use common::error::Error;

use crate::error::ApiError;
use crate::service::{HealthStatus, ImageJobService, UploadReceipt, UpscaleOutcome};

/// Transport settings for [`router`]
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Origins allowed to call the API from a browser
    pub allowed_origins: Vec<String>,
    /// Largest accepted request body
    pub max_upload_bytes: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            max_upload_bytes: 100 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Deserialize)]
struct UpscaleRequest {
    filename: String,
}

type SharedService = Arc<ImageJobService>;

/// Builds the API router
pub fn router(service: SharedService, config: &RouterConfig) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/upload", post(upload))
        .route("/upscale", post(upscale))
        .route("/download/:filename", get(download))
        .route("/uploads/:filename", get(serve_upload))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.allowed_origins))
        .with_state(service)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::AUTHORIZATION])
}

async fn health(State(service): State<SharedService>) -> Json<HealthStatus> {
    Json(service.health())
}

async fn upload(
    State(service): State<SharedService>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadReceipt>, ApiError> {
    let mut multipart =
        multipart.map_err(|e| Error::InvalidArgument(format!("Expected a multipart upload: {}", e.body_text())))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::InvalidArgument(format!("Malformed multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        debug!("Receiving upload {:?} ({:?})", name, content_type);

        let data = field
            .bytes()
            .await
            .map_err(|e| Error::InvalidArgument(format!("Failed to read upload: {}", e)))?;
        let receipt = service
            .upload(name.as_deref(), content_type.as_deref(), &data)
            .await?;
        return Ok(Json(receipt));
    }

    Err(Error::InvalidArgument("Missing multipart field `file`".to_string()).into())
}

async fn upscale(
    State(service): State<SharedService>,
    payload: Result<Json<UpscaleRequest>, JsonRejection>,
) -> Result<Json<UpscaleOutcome>, ApiError> {
    let Json(request) = payload.map_err(|e| Error::InvalidArgument(format!("Malformed request: {}", e.body_text())))?;
    Ok(Json(service.process(&request.filename).await?))
}

async fn download(
    State(service): State<SharedService>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let data = service.download(&filename).await?;
    let mime = mime_guess::from_path(&filename).first_or_octet_stream();
    let disposition = format!("attachment; filename=\"{}\"", filename.replace('"', "_"));

    Ok((
        [
            (header::CONTENT_TYPE, mime.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        data,
    )
        .into_response())
}

async fn serve_upload(
    State(service): State<SharedService>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let data = service.serve_upload(&filename).await?;
    let mime = mime_guess::from_path(&filename).first_or_octet_stream();
    Ok(([(header::CONTENT_TYPE, mime.to_string())], data).into_response())
}
