//! Route definitions for the generation API.
//!
//! Route hierarchy under `/api/v1`:
//!
//! ```text
//! GET  /templates                                        template catalog
//! POST /source-images                                    upload source image
//!
//! POST /shoots                                           create shoot
//! GET  /shoots/{id}                                      shoot snapshot
//! GET  /shoots/{id}/stream                               start + SSE progress
//!
//! POST /shoots/{id}/items/{template_id}/regenerate       re-run one item
//! POST /shoots/{id}/items/{template_id}/variants         generate K variants
//! POST /shoots/{id}/items/{template_id}/variants/{index}/select
//!
//! GET  /artifacts/{shoot_id}/{file}                      artifact bytes
//! ```

pub mod health;

use axum::routing::{get, post};
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/templates", get(handlers::templates::list))
        .route("/source-images", post(handlers::source_images::upload))
        .route("/shoots", post(handlers::shoots::create))
        .route("/shoots/{id}", get(handlers::shoots::get_by_id))
        .route("/shoots/{id}/stream", get(handlers::shoots::stream))
        .route(
            "/shoots/{id}/items/{template_id}/regenerate",
            post(handlers::items::regenerate),
        )
        .route(
            "/shoots/{id}/items/{template_id}/variants",
            post(handlers::items::generate_variants),
        )
        .route(
            "/shoots/{id}/items/{template_id}/variants/{index}/select",
            post(handlers::items::select_variant),
        )
        .route(
            "/artifacts/{shoot_id}/{file}",
            get(handlers::artifacts::get),
        )
}
