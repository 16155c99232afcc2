//! Handler serving generated artifact bytes.

use std::io;

use axum::extract::{Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use lumashot_core::error::CoreError;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// GET /api/v1/artifacts/{shoot_id}/{file}
pub async fn get(
    State(state): State<AppState>,
    Path((shoot_id, file)): Path<(Uuid, String)>,
) -> AppResult<Response> {
    let reference = format!("{shoot_id}/{file}");
    match state.artifacts.read_artifact(&reference).await {
        Ok(bytes) => Ok(([(CONTENT_TYPE, "image/png")], bytes).into_response()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(CoreError::not_found("Artifact", reference).into())
        }
        Err(e) if e.kind() == io::ErrorKind::InvalidInput => {
            Err(AppError::BadRequest(e.to_string()))
        }
        Err(e) => Err(AppError::Internal(format!(
            "Failed to read artifact {reference}: {e}"
        ))),
    }
}
