//! Shoot, item, and variant entities plus their state transitions.
//!
//! A [`ShootJob`] owns its items by value; every mutation goes through
//! the methods here so the progress counter and item statuses cannot
//! drift apart. The orchestrator wraps a `ShootJob` in a mutex and calls
//! these methods inside short synchronous critical sections.

use std::collections::HashMap;

use crate::catalog::ShotTemplate;
use crate::error::CoreError;
use crate::status::{aggregate_status, ItemStatus, JobStatus};
use crate::types::{DbId, ShootId, Timestamp};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Caller-supplied options for a shoot.
#[derive(Debug, Clone, Default)]
pub struct ShootOptions {
    /// Per-item prompt overrides, keyed by template id. An override
    /// replaces the template's base prompt; the shoot style still applies.
    pub prompt_overrides: HashMap<String, String>,
    /// Whether generated artifacts should be post-processed downstream.
    pub post_process: bool,
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// One requested artifact within a shoot.
#[derive(Debug, Clone)]
pub struct ShootItem {
    /// Template slug; doubles as the item id within the shoot.
    pub template_id: String,
    /// Human-readable name copied from the template at build time.
    pub display_name: String,
    pub status: ItemStatus,
    /// Artifact reference, set only when `status == Completed`.
    pub output_ref: Option<String>,
    /// Error message, set only when `status == Failed`.
    pub error: Option<String>,
}

impl ShootItem {
    fn placeholder(template: &ShotTemplate) -> Self {
        Self {
            template_id: template.id.to_string(),
            display_name: template.display_name.to_string(),
            status: ItemStatus::Pending,
            output_ref: None,
            error: None,
        }
    }
}

/// Terminal outcome of one generation attempt sequence for an item.
#[derive(Debug, Clone)]
pub enum ItemOutcome {
    Completed { output_ref: String },
    Failed { error: String },
}

// ---------------------------------------------------------------------------
// Variants
// ---------------------------------------------------------------------------

/// An on-demand alternative rendition of one item.
///
/// Variants are addressed by `(template_id, index)` and are not part of
/// the shoot's `progress`/`total` accounting.
#[derive(Debug, Clone)]
pub struct ShootVariant {
    pub template_id: String,
    pub index: u32,
    pub output_ref: Option<String>,
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Shoot
// ---------------------------------------------------------------------------

/// One generation request producing a fixed set of items from one source
/// image.
#[derive(Debug, Clone)]
pub struct ShootJob {
    pub id: ShootId,
    /// Owner identity; `None` marks an anonymous shoot, which is never
    /// mirrored to the persistence shadow.
    pub user_id: Option<DbId>,
    pub source_image_id: ShootId,
    /// Style parameters appended to every item prompt.
    pub style: String,
    pub status: JobStatus,
    /// Count of settled items. Monotonically increasing, never exceeds
    /// [`total`](Self::total).
    pub progress: u32,
    pub items: Vec<ShootItem>,
    pub variants: Vec<ShootVariant>,
    pub options: ShootOptions,
    pub created_at: Timestamp,
    /// Job-level error message; written by the recovery sweep for
    /// interrupted shoots and round-tripped through the shadow.
    pub error_message: Option<String>,
}

impl ShootJob {
    /// Build a new pending shoot with one placeholder item per template.
    pub fn build(
        source_image_id: ShootId,
        user_id: Option<DbId>,
        style: String,
        templates: &[&ShotTemplate],
        options: ShootOptions,
    ) -> Self {
        Self {
            id: uuid::Uuid::now_v7(),
            user_id,
            source_image_id,
            style,
            status: JobStatus::Pending,
            progress: 0,
            items: templates.iter().map(|t| ShootItem::placeholder(t)).collect(),
            variants: Vec::new(),
            options,
            created_at: chrono::Utc::now(),
            error_message: None,
        }
    }

    /// Number of items in this shoot.
    pub fn total(&self) -> u32 {
        self.items.len() as u32
    }

    pub fn item(&self, template_id: &str) -> Option<&ShootItem> {
        self.items.iter().find(|i| i.template_id == template_id)
    }

    fn item_mut(&mut self, template_id: &str) -> Result<&mut ShootItem, CoreError> {
        self.items
            .iter_mut()
            .find(|i| i.template_id == template_id)
            .ok_or_else(|| CoreError::not_found("ShootItem", template_id))
    }

    /// Per-item prompt override, if the caller supplied one.
    pub fn prompt_override(&self, template_id: &str) -> Option<&str> {
        self.options
            .prompt_overrides
            .get(template_id)
            .map(String::as_str)
    }

    /// Move an item into `Generating`, clearing any previous outcome.
    ///
    /// Used both by the fan-out (`Pending -> Generating`) and by
    /// single-item regeneration (terminal -> `Generating`).
    pub fn begin_item(&mut self, template_id: &str) -> Result<(), CoreError> {
        let item = self.item_mut(template_id)?;
        item.status = ItemStatus::Generating;
        item.output_ref = None;
        item.error = None;
        Ok(())
    }

    /// Settle an item with its terminal outcome and bump `progress`.
    ///
    /// Returns the new progress count. Settling an already-settled item is
    /// rejected so `progress` can never double-count.
    pub fn settle_item(
        &mut self,
        template_id: &str,
        outcome: ItemOutcome,
    ) -> Result<u32, CoreError> {
        let item = self.item_mut(template_id)?;
        if item.status.is_settled() {
            return Err(CoreError::Conflict(format!(
                "Item \"{template_id}\" is already settled"
            )));
        }
        apply_outcome(item, outcome);
        self.progress += 1;
        debug_assert!(self.progress <= self.total());
        Ok(self.progress)
    }

    /// Record a terminal outcome for an item without touching `progress`.
    ///
    /// Used by single-item regeneration, which is a point fix outside the
    /// original fan-out accounting.
    pub fn resolve_item(
        &mut self,
        template_id: &str,
        outcome: ItemOutcome,
    ) -> Result<(), CoreError> {
        let item = self.item_mut(template_id)?;
        apply_outcome(item, outcome);
        Ok(())
    }

    /// Compute and record the terminal aggregate status from item states.
    pub fn finalize(&mut self) -> JobStatus {
        self.status = aggregate_status(self.items.iter().map(|i| i.status));
        self.status
    }

    // -- Variants --

    /// Number of variants already recorded for an item.
    pub fn variant_count(&self, template_id: &str) -> u32 {
        self.variants
            .iter()
            .filter(|v| v.template_id == template_id)
            .count() as u32
    }

    pub fn variant(&self, template_id: &str, index: u32) -> Option<&ShootVariant> {
        self.variants
            .iter()
            .find(|v| v.template_id == template_id && v.index == index)
    }

    pub fn add_variant(&mut self, variant: ShootVariant) {
        self.variants.push(variant);
    }

    /// Promote a variant's artifact to be the item's main output.
    ///
    /// Transfers the artifact reference, marks the item `Completed`, and
    /// clears any prior item error. The variant itself is untouched.
    pub fn select_variant(&mut self, template_id: &str, index: u32) -> Result<(), CoreError> {
        let output_ref = {
            let variant = self
                .variant(template_id, index)
                .ok_or_else(|| CoreError::not_found("ShootVariant", format!("{template_id}#{index}")))?;
            variant.output_ref.clone().ok_or_else(|| {
                CoreError::Validation(format!(
                    "Variant {template_id}#{index} has no artifact to select"
                ))
            })?
        };

        let item = self.item_mut(template_id)?;
        item.output_ref = Some(output_ref);
        item.status = ItemStatus::Completed;
        item.error = None;
        Ok(())
    }
}

fn apply_outcome(item: &mut ShootItem, outcome: ItemOutcome) {
    match outcome {
        ItemOutcome::Completed { output_ref } => {
            item.status = ItemStatus::Completed;
            item.output_ref = Some(output_ref);
            item.error = None;
        }
        ItemOutcome::Failed { error } => {
            item.status = ItemStatus::Failed;
            item.output_ref = None;
            item.error = Some(error);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;

    fn two_item_shoot() -> ShootJob {
        let templates = vec![
            catalog::find("studio-portrait").unwrap(),
            catalog::find("cafe-candid").unwrap(),
        ];
        ShootJob::build(
            uuid::Uuid::now_v7(),
            Some(7),
            "warm".to_string(),
            &templates,
            ShootOptions::default(),
        )
    }

    // -- Building --

    #[test]
    fn build_creates_pending_placeholders() {
        let job = two_item_shoot();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.progress, 0);
        assert_eq!(job.total(), 2);
        for item in &job.items {
            assert_eq!(item.status, ItemStatus::Pending);
            assert!(item.output_ref.is_none());
            assert!(item.error.is_none());
        }
    }

    #[test]
    fn build_preserves_template_order() {
        let job = two_item_shoot();
        assert_eq!(job.items[0].template_id, "studio-portrait");
        assert_eq!(job.items[1].template_id, "cafe-candid");
    }

    // -- Item transitions --

    #[test]
    fn begin_then_settle_completed() {
        let mut job = two_item_shoot();
        job.begin_item("studio-portrait").unwrap();
        assert_eq!(
            job.item("studio-portrait").unwrap().status,
            ItemStatus::Generating
        );

        let progress = job
            .settle_item(
                "studio-portrait",
                ItemOutcome::Completed {
                    output_ref: "a.png".to_string(),
                },
            )
            .unwrap();
        assert_eq!(progress, 1);

        let item = job.item("studio-portrait").unwrap();
        assert_eq!(item.status, ItemStatus::Completed);
        assert_eq!(item.output_ref.as_deref(), Some("a.png"));
        assert!(item.error.is_none());
    }

    #[test]
    fn settle_failed_records_error_only() {
        let mut job = two_item_shoot();
        job.begin_item("cafe-candid").unwrap();
        job.settle_item(
            "cafe-candid",
            ItemOutcome::Failed {
                error: "provider exploded".to_string(),
            },
        )
        .unwrap();

        let item = job.item("cafe-candid").unwrap();
        assert_eq!(item.status, ItemStatus::Failed);
        assert!(item.output_ref.is_none());
        assert_eq!(item.error.as_deref(), Some("provider exploded"));
    }

    #[test]
    fn settle_twice_is_rejected() {
        let mut job = two_item_shoot();
        job.settle_item(
            "cafe-candid",
            ItemOutcome::Completed {
                output_ref: "x.png".to_string(),
            },
        )
        .unwrap();
        let err = job
            .settle_item(
                "cafe-candid",
                ItemOutcome::Failed {
                    error: "again".to_string(),
                },
            )
            .expect_err("double settle must fail");
        assert!(matches!(err, CoreError::Conflict(_)));
        assert_eq!(job.progress, 1);
    }

    #[test]
    fn settle_unknown_item_is_not_found() {
        let mut job = two_item_shoot();
        let err = job
            .settle_item(
                "neon-night",
                ItemOutcome::Failed {
                    error: "nope".to_string(),
                },
            )
            .expect_err("item is not part of this shoot");
        assert!(matches!(err, CoreError::NotFound { .. }));
    }

    #[test]
    fn resolve_item_does_not_touch_progress() {
        let mut job = two_item_shoot();
        job.resolve_item(
            "studio-portrait",
            ItemOutcome::Completed {
                output_ref: "redo.png".to_string(),
            },
        )
        .unwrap();
        assert_eq!(job.progress, 0);
        assert_eq!(
            job.item("studio-portrait").unwrap().status,
            ItemStatus::Completed
        );
    }

    #[test]
    fn begin_item_clears_previous_outcome() {
        let mut job = two_item_shoot();
        job.resolve_item(
            "studio-portrait",
            ItemOutcome::Failed {
                error: "first try".to_string(),
            },
        )
        .unwrap();

        job.begin_item("studio-portrait").unwrap();
        let item = job.item("studio-portrait").unwrap();
        assert_eq!(item.status, ItemStatus::Generating);
        assert!(item.error.is_none());
        assert!(item.output_ref.is_none());
    }

    // -- Finalize --

    #[test]
    fn finalize_mixed_outcomes_is_partial() {
        let mut job = two_item_shoot();
        job.settle_item(
            "studio-portrait",
            ItemOutcome::Completed {
                output_ref: "a.png".to_string(),
            },
        )
        .unwrap();
        job.settle_item(
            "cafe-candid",
            ItemOutcome::Failed {
                error: "boom".to_string(),
            },
        )
        .unwrap();

        assert_eq!(job.finalize(), JobStatus::Partial);
        assert_eq!(job.progress, job.total());
    }

    // -- Variants --

    #[test]
    fn select_variant_transfers_artifact() {
        let mut job = two_item_shoot();
        job.resolve_item(
            "studio-portrait",
            ItemOutcome::Failed {
                error: "original failed".to_string(),
            },
        )
        .unwrap();
        job.add_variant(ShootVariant {
            template_id: "studio-portrait".to_string(),
            index: 0,
            output_ref: Some("v0.png".to_string()),
            error: None,
        });

        job.select_variant("studio-portrait", 0).unwrap();

        let item = job.item("studio-portrait").unwrap();
        assert_eq!(item.status, ItemStatus::Completed);
        assert_eq!(item.output_ref.as_deref(), Some("v0.png"));
        assert!(item.error.is_none());
    }

    #[test]
    fn select_missing_variant_is_not_found() {
        let mut job = two_item_shoot();
        let err = job
            .select_variant("studio-portrait", 3)
            .expect_err("variant does not exist");
        assert!(matches!(err, CoreError::NotFound { .. }));
    }

    #[test]
    fn select_failed_variant_is_rejected() {
        let mut job = two_item_shoot();
        job.add_variant(ShootVariant {
            template_id: "studio-portrait".to_string(),
            index: 0,
            output_ref: None,
            error: Some("no artifact".to_string()),
        });
        let err = job
            .select_variant("studio-portrait", 0)
            .expect_err("variant without artifact cannot be selected");
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn variant_count_is_per_item() {
        let mut job = two_item_shoot();
        job.add_variant(ShootVariant {
            template_id: "studio-portrait".to_string(),
            index: 0,
            output_ref: Some("v0.png".to_string()),
            error: None,
        });
        job.add_variant(ShootVariant {
            template_id: "studio-portrait".to_string(),
            index: 1,
            output_ref: None,
            error: Some("boom".to_string()),
        });
        assert_eq!(job.variant_count("studio-portrait"), 2);
        assert_eq!(job.variant_count("cafe-candid"), 0);
    }
}
