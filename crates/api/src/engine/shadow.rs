//! Persistence shadow access for the engine.
//!
//! [`ShadowStore`] is the seam between the engine and the durable
//! mirror; [`PgShadow`] is the PostgreSQL implementation. [`JobMirror`]
//! wraps a store with the engine's write policy: every write is
//! best-effort (logged and swallowed, never failing the in-memory
//! shoot), and all traffic is skipped for anonymous shoots.

use std::sync::Arc;

use uuid::Uuid;

use lumashot_core::shoot::{ShootJob, ShootVariant};
use lumashot_core::status::{ItemStatus, JobStatus};
use lumashot_db::repositories::ShootRepo;
use lumashot_db::DbPool;

/// Boxed error type shared by all shadow operations.
pub type ShadowError = Box<dyn std::error::Error + Send + Sync>;

/// Durable mirror of shoot state.
///
/// Writes are invoked from the orchestrator and the job builder; reads
/// serve status queries after eviction/restart and the recovery sweep.
/// A running orchestrator never reads back through this trait.
#[async_trait::async_trait]
pub trait ShadowStore: Send + Sync {
    /// Idempotently insert a shoot and all of its items.
    async fn persist_job(&self, job: &ShootJob) -> Result<(), ShadowError>;

    /// Mirror one item's state.
    async fn update_item(
        &self,
        shoot_id: Uuid,
        template_id: &str,
        status: ItemStatus,
        output_ref: Option<&str>,
        error: Option<&str>,
    ) -> Result<(), ShadowError>;

    /// Mirror the shoot's status and, optionally, progress and error.
    async fn update_job(
        &self,
        shoot_id: Uuid,
        status: JobStatus,
        progress: Option<u32>,
        error_message: Option<&str>,
    ) -> Result<(), ShadowError>;

    /// Record one variant outcome.
    async fn record_variant(
        &self,
        shoot_id: Uuid,
        variant: &ShootVariant,
    ) -> Result<(), ShadowError>;

    /// Load a full shoot for result/status reads.
    async fn load_job(&self, shoot_id: Uuid) -> Result<Option<ShootJob>, ShadowError>;

    /// All shoots left in a non-terminal status. Only called at boot.
    async fn list_incomplete(&self) -> Result<Vec<ShootJob>, ShadowError>;
}

// ---------------------------------------------------------------------------
// PostgreSQL implementation
// ---------------------------------------------------------------------------

/// Shadow store backed by the `lumashot-db` repositories.
pub struct PgShadow {
    pool: DbPool,
}

impl PgShadow {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ShadowStore for PgShadow {
    async fn persist_job(&self, job: &ShootJob) -> Result<(), ShadowError> {
        ShootRepo::insert(&self.pool, job).await?;
        Ok(())
    }

    async fn update_item(
        &self,
        shoot_id: Uuid,
        template_id: &str,
        status: ItemStatus,
        output_ref: Option<&str>,
        error: Option<&str>,
    ) -> Result<(), ShadowError> {
        ShootRepo::update_item(&self.pool, shoot_id, template_id, status, output_ref, error)
            .await?;
        Ok(())
    }

    async fn update_job(
        &self,
        shoot_id: Uuid,
        status: JobStatus,
        progress: Option<u32>,
        error_message: Option<&str>,
    ) -> Result<(), ShadowError> {
        ShootRepo::update_job(&self.pool, shoot_id, status, progress, error_message).await?;
        Ok(())
    }

    async fn record_variant(
        &self,
        shoot_id: Uuid,
        variant: &ShootVariant,
    ) -> Result<(), ShadowError> {
        ShootRepo::insert_variant(&self.pool, shoot_id, variant).await?;
        Ok(())
    }

    async fn load_job(&self, shoot_id: Uuid) -> Result<Option<ShootJob>, ShadowError> {
        Ok(ShootRepo::find_by_id(&self.pool, shoot_id).await?)
    }

    async fn list_incomplete(&self) -> Result<Vec<ShootJob>, ShadowError> {
        Ok(ShootRepo::list_incomplete(&self.pool).await?)
    }
}

// ---------------------------------------------------------------------------
// Best-effort mirror
// ---------------------------------------------------------------------------

/// Per-shoot shadow writer applying the engine's write policy.
///
/// Built once per shoot: anonymous shoots get a disabled mirror and
/// produce no shadow traffic at all. Failures are logged and swallowed:
/// the in-memory store stays the source of truth while a shoot runs, and
/// the shadow only needs to be consistent enough for crash recovery and
/// post-eviction reads.
#[derive(Clone)]
pub struct JobMirror {
    store: Option<Arc<dyn ShadowStore>>,
}

impl JobMirror {
    /// Mirror for `job`: enabled only when the shoot has an owner.
    pub fn for_job(store: &Arc<dyn ShadowStore>, job: &ShootJob) -> Self {
        Self {
            store: job.user_id.map(|_| Arc::clone(store)),
        }
    }

    pub async fn persist(&self, job: &ShootJob) {
        let Some(store) = &self.store else { return };
        if let Err(e) = store.persist_job(job).await {
            tracing::warn!(job_id = %job.id, error = %e, "Shadow persist failed; continuing");
        }
    }

    pub async fn item(
        &self,
        shoot_id: Uuid,
        template_id: &str,
        status: ItemStatus,
        output_ref: Option<&str>,
        error: Option<&str>,
    ) {
        let Some(store) = &self.store else { return };
        if let Err(e) = store
            .update_item(shoot_id, template_id, status, output_ref, error)
            .await
        {
            tracing::warn!(
                job_id = %shoot_id,
                template_id,
                error = %e,
                "Shadow item update failed; continuing",
            );
        }
    }

    pub async fn job(
        &self,
        shoot_id: Uuid,
        status: JobStatus,
        progress: Option<u32>,
        error_message: Option<&str>,
    ) {
        let Some(store) = &self.store else { return };
        if let Err(e) = store
            .update_job(shoot_id, status, progress, error_message)
            .await
        {
            tracing::warn!(job_id = %shoot_id, error = %e, "Shadow job update failed; continuing");
        }
    }

    pub async fn variant(&self, shoot_id: Uuid, variant: &ShootVariant) {
        let Some(store) = &self.store else { return };
        if let Err(e) = store.record_variant(shoot_id, variant).await {
            tracing::warn!(
                job_id = %shoot_id,
                template_id = %variant.template_id,
                variant_index = variant.index,
                error = %e,
                "Shadow variant record failed; continuing",
            );
        }
    }
}
