use std::sync::Arc;

use tokio_util::task::TaskTracker;

use crate::config::ServerConfig;
use crate::engine::orchestrator::Orchestrator;
use crate::engine::shadow::ShadowStore;
use crate::engine::store::TaskStore;
use crate::storage::ArtifactStore;

/// Shared application state available to all Axum handlers via
/// `State<AppState>`.
///
/// Cheaply cloneable (inner data is behind `Arc`). Everything here is
/// constructed once at startup and injected, never a module-level global.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: lumashot_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// In-memory shoot registry.
    pub store: Arc<TaskStore>,
    /// The generation engine.
    pub orchestrator: Arc<Orchestrator>,
    /// Persistence shadow (reads for post-eviction queries).
    pub shadow: Arc<dyn ShadowStore>,
    /// Source image and artifact file storage.
    pub artifacts: Arc<ArtifactStore>,
    /// Supervisor for orchestrator runs and publisher pumps.
    pub tracker: TaskTracker,
}
