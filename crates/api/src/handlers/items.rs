//! Handlers for single-item operations on a shoot.
//!
//! Routes (nested under `/shoots/{id}/items/{template_id}`):
//! ```text
//! POST .../regenerate                regenerate         re-run one item in place
//! POST .../variants                  generate_variants  generate K alternatives
//! POST .../variants/{index}/select   select_variant     promote a variant
//! ```

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use lumashot_core::error::CoreError;
use lumashot_core::shoot::ShootVariant;
use lumashot_events::ItemSnapshot;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `POST .../variants`.
#[derive(Debug, Deserialize, Validate)]
pub struct GenerateVariantsRequest {
    /// How many alternatives to render.
    #[validate(range(min = 1, max = 4, message = "count must be between 1 and 4"))]
    pub count: u32,
}

/// Wire view of one variant outcome.
#[derive(Debug, Serialize)]
pub struct VariantSnapshot {
    pub index: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&ShootVariant> for VariantSnapshot {
    fn from(variant: &ShootVariant) -> Self {
        Self {
            index: variant.index,
            output_ref: variant.output_ref.clone(),
            error: variant.error.clone(),
        }
    }
}

/// POST /api/v1/shoots/{id}/items/{template_id}/regenerate
pub async fn regenerate(
    State(state): State<AppState>,
    Path((id, template_id)): Path<(Uuid, String)>,
) -> AppResult<Json<DataResponse<ItemSnapshot>>> {
    let handle = state
        .store
        .get(id)
        .ok_or_else(|| CoreError::not_found("Shoot", id))?;

    let item = state
        .orchestrator
        .regenerate_item(&handle, &template_id)
        .await?;

    Ok(Json(DataResponse {
        data: ItemSnapshot::from(&item),
    }))
}

/// POST /api/v1/shoots/{id}/items/{template_id}/variants
pub async fn generate_variants(
    State(state): State<AppState>,
    Path((id, template_id)): Path<(Uuid, String)>,
    Json(input): Json<GenerateVariantsRequest>,
) -> AppResult<Json<DataResponse<Vec<VariantSnapshot>>>> {
    input.validate()?;

    let handle = state
        .store
        .get(id)
        .ok_or_else(|| CoreError::not_found("Shoot", id))?;

    let variants = state
        .orchestrator
        .generate_variants(&handle, &template_id, input.count)
        .await?;

    Ok(Json(DataResponse {
        data: variants.iter().map(VariantSnapshot::from).collect(),
    }))
}

/// POST /api/v1/shoots/{id}/items/{template_id}/variants/{index}/select
pub async fn select_variant(
    State(state): State<AppState>,
    Path((id, template_id, index)): Path<(Uuid, String, u32)>,
) -> AppResult<Json<DataResponse<ItemSnapshot>>> {
    let handle = state
        .store
        .get(id)
        .ok_or_else(|| CoreError::not_found("Shoot", id))?;

    let item = state
        .orchestrator
        .select_variant(&handle, &template_id, index)
        .await?;

    Ok(Json(DataResponse {
        data: ItemSnapshot::from(&item),
    }))
}
