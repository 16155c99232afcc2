//! Health check endpoint, mounted at the root (not under `/api/v1`).

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::state::AppState;

/// Build the health check router.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// GET /health
///
/// Liveness plus a database round-trip. Always returns 200: a degraded
/// database shows up as `db_healthy: false` rather than an error status,
/// so orchestration keeps the process alive while the shadow recovers.
async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let db_healthy = lumashot_db::health_check(&state.pool).await.is_ok();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "db_healthy": db_healthy,
    }))
}
