//! Row types for the shoot shadow tables and their conversion back into
//! domain entities.
//!
//! Rows are a one-way mirror of in-memory state; conversion to
//! [`ShootJob`] is only exercised by result/status reads and by the
//! recovery sweep, never by a running orchestrator.

use sqlx::FromRow;
use uuid::Uuid;

use lumashot_core::shoot::{ShootItem, ShootJob, ShootOptions, ShootVariant};
use lumashot_core::status::{ItemStatus, JobStatus, StatusId};
use lumashot_core::types::{DbId, Timestamp};

/// A row from the `shoots` table.
#[derive(Debug, Clone, FromRow)]
pub struct ShootRow {
    pub id: Uuid,
    pub user_id: Option<DbId>,
    pub source_image_id: Uuid,
    pub style: String,
    pub status_id: StatusId,
    pub progress: i32,
    pub total: i32,
    pub post_process: bool,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A row from the `shoot_items` table.
#[derive(Debug, Clone, FromRow)]
pub struct ShootItemRow {
    pub shoot_id: Uuid,
    pub template_id: String,
    pub display_name: String,
    pub position: i32,
    pub status_id: StatusId,
    pub output_ref: Option<String>,
    pub error_message: Option<String>,
    pub updated_at: Timestamp,
}

/// A row from the `shoot_variants` table.
#[derive(Debug, Clone, FromRow)]
pub struct ShootVariantRow {
    pub shoot_id: Uuid,
    pub template_id: String,
    pub variant_index: i32,
    pub output_ref: Option<String>,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
}

/// Decode a persisted job status id, rejecting unknown values.
pub fn job_status_from_id(id: StatusId) -> Result<JobStatus, sqlx::Error> {
    JobStatus::from_id(id)
        .ok_or_else(|| sqlx::Error::Decode(format!("unknown shoot status id {id}").into()))
}

/// Decode a persisted item status id, rejecting unknown values.
pub fn item_status_from_id(id: StatusId) -> Result<ItemStatus, sqlx::Error> {
    ItemStatus::from_id(id)
        .ok_or_else(|| sqlx::Error::Decode(format!("unknown shoot item status id {id}").into()))
}

impl ShootRow {
    /// Reassemble a domain [`ShootJob`] from its rows.
    ///
    /// `items` must already be ordered by `position`. Prompt overrides
    /// are transient generation input and are not mirrored, so they come
    /// back empty.
    pub fn into_job(
        self,
        items: Vec<ShootItemRow>,
        variants: Vec<ShootVariantRow>,
    ) -> Result<ShootJob, sqlx::Error> {
        let mut job_items = Vec::with_capacity(items.len());
        for row in items {
            job_items.push(ShootItem {
                template_id: row.template_id,
                display_name: row.display_name,
                status: item_status_from_id(row.status_id)?,
                output_ref: row.output_ref,
                error: row.error_message,
            });
        }

        let job_variants = variants
            .into_iter()
            .map(|row| ShootVariant {
                template_id: row.template_id,
                index: row.variant_index as u32,
                output_ref: row.output_ref,
                error: row.error_message,
            })
            .collect();

        Ok(ShootJob {
            id: self.id,
            user_id: self.user_id,
            source_image_id: self.source_image_id,
            style: self.style,
            status: job_status_from_id(self.status_id)?,
            progress: self.progress.max(0) as u32,
            items: job_items,
            variants: job_variants,
            options: ShootOptions {
                prompt_overrides: Default::default(),
                post_process: self.post_process,
            },
            created_at: self.created_at,
            error_message: self.error_message,
        })
    }
}
