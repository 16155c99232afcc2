//! Handlers for the `/shoots` resource.
//!
//! Routes:
//! ```text
//! POST /shoots              create       build and register a new shoot
//! GET  /shoots/{id}         get_by_id    snapshot (memory first, shadow fallback)
//! GET  /shoots/{id}/stream  stream       claim + run + SSE progress feed
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use lumashot_core::catalog;
use lumashot_core::error::CoreError;
use lumashot_core::shoot::{ShootJob, ShootOptions};
use lumashot_core::types::DbId;
use lumashot_events::{ShootEvent, ShootSnapshot};

use crate::engine::orchestrator::Claim;
use crate::engine::publisher;
use crate::engine::shadow::JobMirror;
use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `POST /api/v1/shoots`.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateShootRequest {
    pub source_image_id: Uuid,
    /// Any subset of the template catalog, in the order items should
    /// appear in the shoot.
    #[validate(length(min = 1, max = 24, message = "select between 1 and 24 templates"))]
    pub template_ids: Vec<String>,
    /// Style parameters appended to every item prompt.
    #[serde(default)]
    pub style: String,
    /// Owner identity. Anonymous shoots are not mirrored to the shadow
    /// and survive only until evicted from memory.
    pub user_id: Option<DbId>,
    /// Per-item prompt overrides, keyed by template id.
    #[serde(default)]
    pub prompt_overrides: HashMap<String, String>,
    #[serde(default)]
    pub post_process: bool,
}

/// POST /api/v1/shoots
///
/// The job builder: validates the request, resolves templates into
/// placeholder items, registers the shoot in the task store, and mirrors
/// it to the shadow. Generation does not start until the caller opens
/// the progress stream.
pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<CreateShootRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<ShootSnapshot>>)> {
    input.validate()?;
    let templates = catalog::resolve(&input.template_ids)?;

    if !state.artifacts.source_exists(input.source_image_id).await {
        return Err(CoreError::not_found("SourceImage", input.source_image_id).into());
    }

    let options = ShootOptions {
        prompt_overrides: input.prompt_overrides,
        post_process: input.post_process,
    };
    let job = ShootJob::build(
        input.source_image_id,
        input.user_id,
        input.style,
        &templates,
        options,
    );

    let handle = state.store.insert(job);
    let snapshot = handle.snapshot();
    JobMirror::for_job(&state.shadow, &snapshot)
        .persist(&snapshot)
        .await;

    tracing::info!(
        job_id = %snapshot.id,
        total = snapshot.total(),
        owned = snapshot.user_id.is_some(),
        "Shoot created",
    );

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: ShootSnapshot::from(&snapshot),
        }),
    ))
}

/// GET /api/v1/shoots/{id}
///
/// Reads from the task store while the shoot is in memory, falling back
/// to the shadow after eviction or a restart.
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DataResponse<ShootSnapshot>>> {
    if let Some(handle) = state.store.get(id) {
        return Ok(Json(DataResponse {
            data: ShootSnapshot::from(&handle.snapshot()),
        }));
    }

    let job = state
        .shadow
        .load_job(id)
        .await
        .map_err(AppError::from_shadow)?
        .ok_or_else(|| CoreError::not_found("Shoot", id))?;

    Ok(Json(DataResponse {
        data: ShootSnapshot::from(&job),
    }))
}

/// GET /api/v1/shoots/{id}/stream
///
/// Single-flight start + progress feed. The winning subscriber claims
/// the pending shoot, the orchestrator is spawned, and events stream
/// until `completed`. A terminal shoot (in memory or only in the shadow)
/// yields one synthetic `completed`; a shoot already starting/running is
/// rejected with a Conflict.
pub async fn stream(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Response> {
    match state.orchestrator.try_claim(id) {
        Ok(Claim::Started(handle)) => {
            state.orchestrator.spawn_run(Arc::clone(&handle));
            let stream = publisher::subscribe(handle, &state.tracker).map(event_frame);
            Ok(Sse::new(stream).into_response())
        }
        Ok(Claim::Finished(job)) => {
            let stream = publisher::completed_stream(&job).map(event_frame);
            Ok(Sse::new(stream).into_response())
        }
        Err(CoreError::NotFound { .. }) => {
            // Evicted or created before a restart; the shadow still has it.
            let job = state
                .shadow
                .load_job(id)
                .await
                .map_err(AppError::from_shadow)?
                .ok_or_else(|| CoreError::not_found("Shoot", id))?;
            if job.status.is_terminal() {
                let stream = publisher::completed_stream(&job).map(event_frame);
                Ok(Sse::new(stream).into_response())
            } else {
                Err(CoreError::Conflict(
                    "Shoot generation is already in progress".to_string(),
                )
                .into())
            }
        }
        Err(e) => Err(e.into()),
    }
}

/// Serialize one progress event as an SSE frame.
fn event_frame(event: ShootEvent) -> Result<Event, axum::Error> {
    Event::default().event(event.kind()).json_data(&event)
}
