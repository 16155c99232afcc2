//! Repository for the shoot shadow tables.
//!
//! Every write here is invoked best-effort by the shadow writer: callers
//! log and swallow errors rather than failing the in-memory shoot. Reads
//! serve status queries after eviction/restart and the recovery sweep.

use sqlx::PgPool;
use uuid::Uuid;

use lumashot_core::shoot::{ShootJob, ShootVariant};
use lumashot_core::status::{ItemStatus, JobStatus};

use crate::models::shoot::{ShootItemRow, ShootRow, ShootVariantRow};

/// Column list for `shoots` queries.
const SHOOT_COLUMNS: &str = "\
    id, user_id, source_image_id, style, status_id, progress, total, \
    post_process, error_message, created_at, updated_at";

/// Column list for `shoot_items` queries.
const ITEM_COLUMNS: &str = "\
    shoot_id, template_id, display_name, position, status_id, \
    output_ref, error_message, updated_at";

/// Column list for `shoot_variants` queries.
const VARIANT_COLUMNS: &str =
    "shoot_id, template_id, variant_index, output_ref, error_message, created_at";

/// CRUD operations for the shoot shadow.
pub struct ShootRepo;

impl ShootRepo {
    /// Idempotently insert a shoot and all of its items.
    ///
    /// `ON CONFLICT DO NOTHING` on both tables makes re-persisting an
    /// already-mirrored shoot a no-op, so callers need no exists-check.
    pub async fn insert(pool: &PgPool, job: &ShootJob) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query(
            "INSERT INTO shoots \
                 (id, user_id, source_image_id, style, status_id, progress, total, \
                  post_process, error_message, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(job.id)
        .bind(job.user_id)
        .bind(job.source_image_id)
        .bind(&job.style)
        .bind(job.status.id())
        .bind(job.progress as i32)
        .bind(job.total() as i32)
        .bind(job.options.post_process)
        .bind(&job.error_message)
        .bind(job.created_at)
        .execute(&mut *tx)
        .await?;

        for (position, item) in job.items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO shoot_items \
                     (shoot_id, template_id, display_name, position, status_id, \
                      output_ref, error_message) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7) \
                 ON CONFLICT (shoot_id, template_id) DO NOTHING",
            )
            .bind(job.id)
            .bind(&item.template_id)
            .bind(&item.display_name)
            .bind(position as i32)
            .bind(item.status.id())
            .bind(&item.output_ref)
            .bind(&item.error)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await
    }

    /// Mirror one item's state.
    pub async fn update_item(
        pool: &PgPool,
        shoot_id: Uuid,
        template_id: &str,
        status: ItemStatus,
        output_ref: Option<&str>,
        error: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE shoot_items \
             SET status_id = $3, output_ref = $4, error_message = $5, updated_at = NOW() \
             WHERE shoot_id = $1 AND template_id = $2",
        )
        .bind(shoot_id)
        .bind(template_id)
        .bind(status.id())
        .bind(output_ref)
        .bind(error)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Mirror the shoot's status and, when given, progress and error.
    ///
    /// A `None` progress leaves the stored counter untouched so status
    /// transitions never regress it.
    pub async fn update_job(
        pool: &PgPool,
        shoot_id: Uuid,
        status: JobStatus,
        progress: Option<u32>,
        error_message: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE shoots \
             SET status_id = $2, \
                 progress = COALESCE($3, progress), \
                 error_message = COALESCE($4, error_message), \
                 updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(shoot_id)
        .bind(status.id())
        .bind(progress.map(|p| p as i32))
        .bind(error_message)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Record one variant outcome.
    pub async fn insert_variant(
        pool: &PgPool,
        shoot_id: Uuid,
        variant: &ShootVariant,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO shoot_variants \
                 (shoot_id, template_id, variant_index, output_ref, error_message) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (shoot_id, template_id, variant_index) DO UPDATE \
                 SET output_ref = EXCLUDED.output_ref, \
                     error_message = EXCLUDED.error_message",
        )
        .bind(shoot_id)
        .bind(&variant.template_id)
        .bind(variant.index as i32)
        .bind(&variant.output_ref)
        .bind(&variant.error)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Load a full shoot (items ordered by position, plus variants).
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<ShootJob>, sqlx::Error> {
        let query = format!("SELECT {SHOOT_COLUMNS} FROM shoots WHERE id = $1");
        let Some(row) = sqlx::query_as::<_, ShootRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await?
        else {
            return Ok(None);
        };

        let items = Self::items_for(pool, id).await?;
        let variants = Self::variants_for(pool, id).await?;

        row.into_job(items, variants).map(Some)
    }

    /// All shoots left in a non-terminal status. Only called at boot by
    /// the recovery sweep.
    pub async fn list_incomplete(pool: &PgPool) -> Result<Vec<ShootJob>, sqlx::Error> {
        let query = format!(
            "SELECT {SHOOT_COLUMNS} FROM shoots \
             WHERE status_id IN ($1, $2, $3) \
             ORDER BY created_at ASC"
        );
        let rows = sqlx::query_as::<_, ShootRow>(&query)
            .bind(JobStatus::Pending.id())
            .bind(JobStatus::Starting.id())
            .bind(JobStatus::Running.id())
            .fetch_all(pool)
            .await?;

        let mut jobs = Vec::with_capacity(rows.len());
        for row in rows {
            let items = Self::items_for(pool, row.id).await?;
            jobs.push(row.into_job(items, Vec::new())?);
        }
        Ok(jobs)
    }

    async fn items_for(pool: &PgPool, shoot_id: Uuid) -> Result<Vec<ShootItemRow>, sqlx::Error> {
        let query = format!(
            "SELECT {ITEM_COLUMNS} FROM shoot_items \
             WHERE shoot_id = $1 ORDER BY position ASC"
        );
        sqlx::query_as::<_, ShootItemRow>(&query)
            .bind(shoot_id)
            .fetch_all(pool)
            .await
    }

    async fn variants_for(
        pool: &PgPool,
        shoot_id: Uuid,
    ) -> Result<Vec<ShootVariantRow>, sqlx::Error> {
        let query = format!(
            "SELECT {VARIANT_COLUMNS} FROM shoot_variants \
             WHERE shoot_id = $1 ORDER BY template_id, variant_index ASC"
        );
        sqlx::query_as::<_, ShootVariantRow>(&query)
            .bind(shoot_id)
            .fetch_all(pool)
            .await
    }
}
