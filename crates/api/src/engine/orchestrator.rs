//! Fan-out executor for shoot generation.
//!
//! Drives a claimed shoot to its terminal state: one task per item under
//! a fixed concurrency bound, one provider call per attempt with a
//! single internal retry, every mutation mirrored to the shadow and
//! announced on the shoot's progress signal. Item failures never abort
//! siblings and there is no job-level abort path: the shoot always runs
//! every item to a settled state.
//!
//! The same primitives back the single-item operations: regeneration,
//! variant batches, and variant selection.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::task::TaskTracker;

use lumashot_core::error::CoreError;
use lumashot_core::shoot::{ItemOutcome, ShootItem, ShootJob, ShootVariant};
use lumashot_core::status::{ItemStatus, JobStatus};
use lumashot_core::types::ShootId;
use lumashot_core::{catalog, prompt};
use lumashot_render::{ImageProvider, RenderError};

use crate::engine::shadow::{JobMirror, ShadowStore};
use crate::engine::store::{JobHandle, TaskStore};
use crate::storage::ArtifactStore;

/// Provider attempts per item: the original call plus one retry.
pub const GENERATION_ATTEMPTS: u32 = 2;

/// Default number of provider calls in flight per shoot.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Result of a single-flight claim attempt.
#[derive(Debug)]
pub enum Claim {
    /// The claim won the `Pending -> Starting` transition; the caller owns
    /// the run.
    Started(Arc<JobHandle>),
    /// The shoot already reached a terminal state; no re-run happens.
    Finished(ShootJob),
}

enum ClaimOutcome {
    Claimed,
    InFlight,
    Finished(ShootJob),
}

/// The generation engine for one process.
///
/// Constructed once at startup and injected via `AppState`; the provider
/// and shadow sit behind trait objects so tests can script them.
pub struct Orchestrator {
    store: Arc<TaskStore>,
    shadow: Arc<dyn ShadowStore>,
    provider: Arc<dyn ImageProvider>,
    artifacts: Arc<ArtifactStore>,
    concurrency: usize,
    tracker: TaskTracker,
}

impl Orchestrator {
    pub fn new(
        store: Arc<TaskStore>,
        shadow: Arc<dyn ShadowStore>,
        provider: Arc<dyn ImageProvider>,
        artifacts: Arc<ArtifactStore>,
        concurrency: usize,
        tracker: TaskTracker,
    ) -> Self {
        Self {
            store,
            shadow,
            provider,
            artifacts,
            concurrency: concurrency.max(1),
            tracker,
        }
    }

    /// Task tracker supervising spawned runs.
    pub fn tracker(&self) -> &TaskTracker {
        &self.tracker
    }

    // -----------------------------------------------------------------------
    // Claiming
    // -----------------------------------------------------------------------

    /// Atomically claim a pending shoot for execution.
    ///
    /// The `Pending -> Starting` check-and-set happens under the job lock,
    /// so of two concurrent callers exactly one wins; the loser observes
    /// `Starting`/`Running` and gets a [`CoreError::Conflict`] without
    /// mutating anything. A terminal shoot is returned as
    /// [`Claim::Finished`] so the caller can serve its final state.
    pub fn try_claim(&self, id: ShootId) -> Result<Claim, CoreError> {
        let handle = self
            .store
            .get(id)
            .ok_or_else(|| CoreError::not_found("Shoot", id))?;

        let outcome = handle.with_state(|job| match job.status {
            JobStatus::Pending => {
                job.status = JobStatus::Starting;
                ClaimOutcome::Claimed
            }
            JobStatus::Starting | JobStatus::Running => ClaimOutcome::InFlight,
            JobStatus::Completed | JobStatus::Partial | JobStatus::Failed => {
                ClaimOutcome::Finished(job.clone())
            }
        });

        match outcome {
            ClaimOutcome::Claimed => Ok(Claim::Started(handle)),
            ClaimOutcome::InFlight => Err(CoreError::Conflict(
                "Shoot generation is already in progress".to_string(),
            )),
            ClaimOutcome::Finished(job) => Ok(Claim::Finished(job)),
        }
    }

    /// Spawn a claimed run onto the supervised tracker.
    ///
    /// Fire-and-forget from the caller's point of view, but the process
    /// can still await the task during graceful shutdown.
    pub fn spawn_run(self: &Arc<Self>, handle: Arc<JobHandle>) {
        let this = Arc::clone(self);
        self.tracker.spawn(this.run(handle));
    }

    // -----------------------------------------------------------------------
    // The fan-out
    // -----------------------------------------------------------------------

    /// Run a claimed shoot to completion.
    pub async fn run(self: Arc<Self>, handle: Arc<JobHandle>) {
        let snapshot = handle.with_state(|job| {
            job.status = JobStatus::Running;
            job.clone()
        });
        let job_id = snapshot.id;
        let mirror = JobMirror::for_job(&self.shadow, &snapshot);
        mirror.job(job_id, JobStatus::Running, None, None).await;
        handle.signal().set();

        tracing::info!(
            job_id = %job_id,
            total = snapshot.total(),
            concurrency = self.concurrency,
            "Shoot fan-out starting",
        );

        // One source read, shared by every item task. A failed read does
        // not abort the run: each item settles as failed with the message.
        let source: Result<Arc<Vec<u8>>, String> = match self
            .artifacts
            .read_source(snapshot.source_image_id)
            .await
        {
            Ok(bytes) => Ok(Arc::new(bytes)),
            Err(e) => Err(format!("Source image unavailable: {e}")),
        };

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        for item in &snapshot.items {
            let this = Arc::clone(&self);
            let handle = Arc::clone(&handle);
            let mirror = mirror.clone();
            let source = source.clone();
            let semaphore = Arc::clone(&semaphore);
            let template_id = item.template_id.clone();
            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire().await else {
                    return;
                };
                this.run_item(&handle, &mirror, &source, &template_id).await;
            });
        }

        // Await every unit. The terminal event must come strictly after
        // the last per-item event.
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!(job_id = %job_id, error = %e, "Shoot item task aborted");
            }
        }

        let (status, progress, total) = handle.with_state(|job| {
            let status = job.finalize();
            (status, job.progress, job.total())
        });
        mirror.job(job_id, status, Some(progress), None).await;
        handle.signal().set();

        tracing::info!(
            job_id = %job_id,
            status = ?status,
            progress,
            total,
            "Shoot finished",
        );
    }

    /// Drive one item from `Generating` to its settled state.
    async fn run_item(
        &self,
        handle: &Arc<JobHandle>,
        mirror: &JobMirror,
        source: &Result<Arc<Vec<u8>>, String>,
        template_id: &str,
    ) {
        let job_id = handle.id();
        if let Err(e) = handle.with_state(|job| job.begin_item(template_id)) {
            tracing::error!(job_id = %job_id, template_id, error = %e, "Item missing at fan-out");
            return;
        }
        mirror
            .item(job_id, template_id, ItemStatus::Generating, None, None)
            .await;
        handle.signal().set();

        let outcome = self.produce_outcome(handle, template_id, source).await;

        // Settling the item and bumping progress is one synchronous
        // critical section under the job lock.
        let progress = match handle.with_state(|job| job.settle_item(template_id, outcome.clone()))
        {
            Ok(progress) => progress,
            Err(e) => {
                tracing::error!(job_id = %job_id, template_id, error = %e, "Failed to settle item");
                return;
            }
        };

        let (status, output_ref, error) = outcome_parts(&outcome);
        mirror
            .item(job_id, template_id, status, output_ref, error)
            .await;
        mirror
            .job(job_id, JobStatus::Running, Some(progress), None)
            .await;
        handle.signal().set();
    }

    /// Compose the prompt, call the provider (with retry), and store the
    /// artifact. Every failure mode collapses into a `Failed` outcome:
    /// generation errors are data, not exceptions.
    async fn produce_outcome(
        &self,
        handle: &Arc<JobHandle>,
        template_id: &str,
        source: &Result<Arc<Vec<u8>>, String>,
    ) -> ItemOutcome {
        let Some(template) = catalog::find(template_id) else {
            return ItemOutcome::Failed {
                error: format!("Unknown template \"{template_id}\""),
            };
        };
        let source = match source {
            Ok(bytes) => Arc::clone(bytes),
            Err(message) => {
                return ItemOutcome::Failed {
                    error: message.clone(),
                }
            }
        };
        let prompt = handle
            .with_state(|job| prompt::compose(template, &job.style, job.prompt_override(template_id)));

        match self
            .generate_with_retry(&source, &prompt, template.aspect_ratio)
            .await
        {
            Ok(bytes) => match self
                .artifacts
                .store_artifact(handle.id(), template_id, None, &bytes)
                .await
            {
                Ok(output_ref) => ItemOutcome::Completed { output_ref },
                Err(e) => ItemOutcome::Failed {
                    error: format!("Failed to store artifact: {e}"),
                },
            },
            Err(e) => ItemOutcome::Failed {
                error: e.to_string(),
            },
        }
    }

    /// One bounded attempt loop per item: the original call plus one
    /// retry, single code path. The error of the final attempt wins.
    async fn generate_with_retry(
        &self,
        source: &[u8],
        prompt: &str,
        aspect_ratio: &str,
    ) -> Result<Vec<u8>, RenderError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.provider.generate(source, prompt, aspect_ratio).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) if attempt < GENERATION_ATTEMPTS => {
                    tracing::warn!(attempt, error = %e, "Provider call failed, retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }

    // -----------------------------------------------------------------------
    // Single-item operations
    // -----------------------------------------------------------------------

    /// Re-run one item in place.
    ///
    /// A point fix outside the original fan-out: the item goes back to
    /// `Generating`, one attempt sequence runs, and the result lands
    /// without touching the shoot's `progress`/`total` accounting.
    /// Rejected while the fan-out is running to keep the item single-writer.
    pub async fn regenerate_item(
        &self,
        handle: &Arc<JobHandle>,
        template_id: &str,
    ) -> Result<ShootItem, CoreError> {
        let snapshot = handle.with_state(|job| {
            if matches!(job.status, JobStatus::Starting | JobStatus::Running) {
                return Err(CoreError::Conflict(
                    "Cannot regenerate an item while the shoot is running".to_string(),
                ));
            }
            job.begin_item(template_id)?;
            Ok(job.clone())
        })?;

        let job_id = snapshot.id;
        let mirror = JobMirror::for_job(&self.shadow, &snapshot);
        mirror
            .item(job_id, template_id, ItemStatus::Generating, None, None)
            .await;
        handle.signal().set();

        let source: Result<Arc<Vec<u8>>, String> = match self
            .artifacts
            .read_source(snapshot.source_image_id)
            .await
        {
            Ok(bytes) => Ok(Arc::new(bytes)),
            Err(e) => Err(format!("Source image unavailable: {e}")),
        };
        let outcome = self.produce_outcome(handle, template_id, &source).await;

        handle.with_state(|job| job.resolve_item(template_id, outcome.clone()))?;
        let (status, output_ref, error) = outcome_parts(&outcome);
        mirror
            .item(job_id, template_id, status, output_ref, error)
            .await;
        handle.signal().set();

        handle
            .with_state(|job| job.item(template_id).cloned())
            .ok_or_else(|| CoreError::not_found("ShootItem", template_id))
    }

    /// Generate `count` alternative renditions of one item.
    ///
    /// The calls run concurrently, bounded by `count` itself; variants
    /// never share the fan-out's semaphore. Per-variant failures are
    /// recorded on the variant and do not block siblings.
    pub async fn generate_variants(
        &self,
        handle: &Arc<JobHandle>,
        template_id: &str,
        count: u32,
    ) -> Result<Vec<ShootVariant>, CoreError> {
        let (snapshot, base_index) = handle.with_state(|job| {
            if job.item(template_id).is_none() {
                return Err(CoreError::not_found("ShootItem", template_id));
            }
            Ok((job.clone(), job.variant_count(template_id)))
        })?;
        let template = catalog::find(template_id)
            .ok_or_else(|| CoreError::not_found("ShotTemplate", template_id))?;

        let job_id = snapshot.id;
        let source = self
            .artifacts
            .read_source(snapshot.source_image_id)
            .await
            .map(Arc::new)
            .map_err(|e| CoreError::Internal(format!("Source image unavailable: {e}")))?;
        let prompt = prompt::compose(template, &snapshot.style, snapshot.prompt_override(template_id));

        let renders = futures::future::join_all((0..count).map(|k| {
            let source = Arc::clone(&source);
            let prompt = prompt.clone();
            async move {
                let index = base_index + k;
                let result = self
                    .generate_with_retry(&source, &prompt, template.aspect_ratio)
                    .await;
                (index, result)
            }
        }))
        .await;

        let mut variants = Vec::with_capacity(renders.len());
        for (index, result) in renders {
            let variant = match result {
                Ok(bytes) => match self
                    .artifacts
                    .store_artifact(job_id, template_id, Some(index), &bytes)
                    .await
                {
                    Ok(output_ref) => ShootVariant {
                        template_id: template_id.to_string(),
                        index,
                        output_ref: Some(output_ref),
                        error: None,
                    },
                    Err(e) => ShootVariant {
                        template_id: template_id.to_string(),
                        index,
                        output_ref: None,
                        error: Some(format!("Failed to store artifact: {e}")),
                    },
                },
                Err(e) => ShootVariant {
                    template_id: template_id.to_string(),
                    index,
                    output_ref: None,
                    error: Some(e.to_string()),
                },
            };
            variants.push(variant);
        }

        let mirror = JobMirror::for_job(&self.shadow, &snapshot);
        handle.with_state(|job| {
            for variant in &variants {
                job.add_variant(variant.clone());
            }
        });
        for variant in &variants {
            mirror.variant(job_id, variant).await;
        }
        handle.signal().set();

        Ok(variants)
    }

    /// Promote a variant's artifact to be the item's main output.
    ///
    /// Pure reference transfer; no provider call is made.
    pub async fn select_variant(
        &self,
        handle: &Arc<JobHandle>,
        template_id: &str,
        index: u32,
    ) -> Result<ShootItem, CoreError> {
        let snapshot = handle.with_state(|job| {
            job.select_variant(template_id, index)?;
            Ok::<_, CoreError>(job.clone())
        })?;

        let item = snapshot
            .item(template_id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("ShootItem", template_id))?;

        let mirror = JobMirror::for_job(&self.shadow, &snapshot);
        mirror
            .item(
                snapshot.id,
                template_id,
                item.status,
                item.output_ref.as_deref(),
                None,
            )
            .await;
        handle.signal().set();

        Ok(item)
    }
}

fn outcome_parts(outcome: &ItemOutcome) -> (ItemStatus, Option<&str>, Option<&str>) {
    match outcome {
        ItemOutcome::Completed { output_ref } => {
            (ItemStatus::Completed, Some(output_ref.as_str()), None)
        }
        ItemOutcome::Failed { error } => (ItemStatus::Failed, None, Some(error.as_str())),
    }
}
