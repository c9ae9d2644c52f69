use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::{
    credentials::CredentialStore,
    error::BatchError,
    models::{
        ApparelType, BatchResponse, ColorChoice, CredentialStatus, CredentialUpdate, GeneratedImage, ImageUpload,
        MockupRequest, SourceImage, VariationRequest,
    },
    orchestrator::BatchOrchestrator,
    palette::{find_color, palette},
};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<BatchOrchestrator>,
    pub credentials: Arc<dyn CredentialStore>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Batch(#[from] BatchError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message, reauthenticate) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone(), false),
            ApiError::Batch(err) => {
                let status = match err {
                    BatchError::EmptySelection => StatusCode::BAD_REQUEST,
                    BatchError::MissingCredential | BatchError::CredentialInvalid(_) => StatusCode::UNAUTHORIZED,
                    BatchError::Generation(_) => StatusCode::BAD_GATEWAY,
                    BatchError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, err.kind(), err.user_message(), err.requires_reauthentication())
            }
        };
        let body = json!({ "error": message, "kind": kind, "reauthenticate": reauthenticate });
        (status, Json(body)).into_response()
    }
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    // uploads arrive base64-encoded inside JSON
    let body_limit = max_upload_bytes / 3 * 4 + 64 * 1024;
    Router::new()
        .route("/api/health", get(health))
        .route("/api/colors", get(list_colors))
        .route("/api/apparel-types", get(list_apparel_types))
        .route(
            "/api/credential",
            get(credential_status).put(set_credential).delete(clear_credential),
        )
        .route("/api/variations", axum::routing::post(generate_variations))
        .route("/api/mockups", axum::routing::post(remake_mockups))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn list_colors() -> Json<&'static [ColorChoice]> {
    Json(palette())
}

pub async fn list_apparel_types() -> Json<[ApparelType; 3]> {
    Json(ApparelType::ALL)
}

pub async fn credential_status(State(state): State<AppState>) -> Json<CredentialStatus> {
    Json(CredentialStatus { present: state.credentials.get().is_some() })
}

pub async fn set_credential(
    State(state): State<AppState>,
    payload: Result<Json<CredentialUpdate>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(body) = payload?;
    if body.api_key.trim().is_empty() {
        return Err(ApiError::BadRequest("API key must not be empty.".into()));
    }
    state.credentials.set(&body.api_key);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn clear_credential(State(state): State<AppState>) -> StatusCode {
    state.credentials.clear();
    StatusCode::NO_CONTENT
}

fn source_image(upload: ImageUpload) -> Result<SourceImage, ApiError> {
    if upload.data.is_empty() {
        return Err(ApiError::BadRequest("Please choose an image first.".into()));
    }
    let mime_type = match upload.mime_type.map(|m| m.trim().to_ascii_lowercase()).filter(|m| !m.is_empty()) {
        Some(m) if m.starts_with("image/") => m,
        Some(m) => return Err(ApiError::BadRequest(format!("Unsupported upload type '{m}'."))),
        None => image::guess_format(&upload.data)
            .map(|f| f.to_mime_type().to_string())
            .map_err(|_| ApiError::BadRequest("Could not detect the image format of the upload.".into()))?,
    };
    Ok(SourceImage::new(upload.data, mime_type))
}

fn batch_response(images: Vec<GeneratedImage>) -> Json<BatchResponse> {
    let batch_id = Uuid::new_v4();
    tracing::info!("✅ Batch {} delivered {} images", batch_id, images.len());
    Json(BatchResponse { batch_id, generated_at: Utc::now(), images })
}

pub async fn generate_variations(
    State(state): State<AppState>,
    payload: Result<Json<VariationRequest>, JsonRejection>,
) -> Result<Json<BatchResponse>, ApiError> {
    let Json(body) = payload?;
    let colors = body
        .colors
        .iter()
        .map(|value| find_color(value).ok_or_else(|| ApiError::BadRequest(format!("Unknown color '{value}'."))))
        .collect::<Result<Vec<_>, _>>()?;
    let image = source_image(body.image)?;

    tracing::info!("🚀 Variation request for {} colors ({})", colors.len(), image.mime_type);
    let images = state.orchestrator.generate_color_variations(image, &colors).await?;
    Ok(batch_response(images))
}

pub async fn remake_mockups(
    State(state): State<AppState>,
    payload: Result<Json<MockupRequest>, JsonRejection>,
) -> Result<Json<BatchResponse>, ApiError> {
    let Json(body) = payload?;
    let image = source_image(body.image)?;

    tracing::info!("🚀 Mockup request for {:?} ({})", body.apparel_types, image.mime_type);
    let images = state.orchestrator.remake_mockups(image, &body.apparel_types).await?;
    Ok(batch_response(images))
}
