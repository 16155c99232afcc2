//! Handlers for source image upload.
//!
//! Uploads are raw request bodies with an `image/*` content type; the
//! returned id is referenced by `POST /shoots`.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Largest accepted source image.
const MAX_SOURCE_BYTES: usize = 20 * 1024 * 1024;

/// Response body for a stored source image.
#[derive(Debug, Serialize)]
pub struct SourceImageResponse {
    pub id: Uuid,
}

/// POST /api/v1/source-images
pub async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<(StatusCode, Json<DataResponse<SourceImageResponse>>)> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if !content_type.starts_with("image/") {
        return Err(AppError::BadRequest(format!(
            "Expected an image/* content type, got \"{content_type}\""
        )));
    }
    if body.is_empty() {
        return Err(AppError::BadRequest("Empty request body".to_string()));
    }
    if body.len() > MAX_SOURCE_BYTES {
        return Err(AppError::BadRequest(format!(
            "Source image exceeds {MAX_SOURCE_BYTES} bytes"
        )));
    }

    let id = state
        .artifacts
        .store_source(&body)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to store source image: {e}")))?;

    tracing::info!(source_image_id = %id, bytes = body.len(), "Source image stored");

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: SourceImageResponse { id },
        }),
    ))
}
