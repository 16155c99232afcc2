//! Startup sweep over shoots the previous process left incomplete.
//!
//! Runs once at boot, before the server accepts requests, and touches
//! only the persistence shadow. Idempotent by construction: a second run
//! finds no incomplete shoots. Items are finalized before the parent
//! shoot so a crash mid-sweep leaves the shoot discoverable for the next
//! run.

use lumashot_core::recovery::{
    interrupted_status, INTERRUPTED_ITEM_MESSAGE, INTERRUPTED_JOB_MESSAGE,
};
use lumashot_core::status::ItemStatus;

use crate::engine::shadow::{ShadowError, ShadowStore};

/// Finalize every shoot left in a non-terminal status.
///
/// A shoot that settled at least one item becomes `Partial`, one that
/// settled nothing becomes `Failed`; unsettled items are marked failed
/// with a fixed interrupted-by-restart message. Returns the number of
/// shoots finalized.
pub async fn run_sweep(shadow: &dyn ShadowStore) -> Result<usize, ShadowError> {
    let incomplete = shadow.list_incomplete().await?;
    if incomplete.is_empty() {
        tracing::info!("Recovery sweep found no interrupted shoots");
        return Ok(0);
    }

    let mut finalized = 0;
    for job in incomplete {
        let status = interrupted_status(job.progress);

        for item in job.items.iter().filter(|i| !i.status.is_settled()) {
            if let Err(e) = shadow
                .update_item(
                    job.id,
                    &item.template_id,
                    ItemStatus::Failed,
                    None,
                    Some(INTERRUPTED_ITEM_MESSAGE),
                )
                .await
            {
                tracing::warn!(
                    job_id = %job.id,
                    template_id = %item.template_id,
                    error = %e,
                    "Recovery sweep failed to finalize item",
                );
            }
        }

        match shadow
            .update_job(job.id, status, None, Some(INTERRUPTED_JOB_MESSAGE))
            .await
        {
            Ok(()) => {
                finalized += 1;
                tracing::info!(
                    job_id = %job.id,
                    status = ?status,
                    progress = job.progress,
                    total = job.total(),
                    "Finalized interrupted shoot",
                );
            }
            Err(e) => {
                tracing::warn!(
                    job_id = %job.id,
                    error = %e,
                    "Recovery sweep failed to finalize shoot",
                );
            }
        }
    }

    Ok(finalized)
}
