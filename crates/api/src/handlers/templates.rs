//! Handler for the shot template catalog.

use axum::Json;
use serde::Serialize;

use lumashot_core::catalog;

use crate::response::DataResponse;

/// Wire view of one catalog template.
#[derive(Debug, Serialize)]
pub struct TemplateInfo {
    pub id: &'static str,
    pub display_name: &'static str,
    pub aspect_ratio: &'static str,
}

/// GET /api/v1/templates
pub async fn list() -> Json<DataResponse<Vec<TemplateInfo>>> {
    let templates = catalog::TEMPLATES
        .iter()
        .map(|t| TemplateInfo {
            id: t.id,
            display_name: t.display_name,
            aspect_ratio: t.aspect_ratio,
        })
        .collect();

    Json(DataResponse { data: templates })
}
