//! Typed progress events and snapshot DTOs for the wire protocol.
//!
//! A subscriber's stream is `started`, zero or more `progress` events,
//! then exactly one `completed`. Every event is one JSON object with an
//! internal `type` tag; `progress`/`completed` carry the full item list
//! so clients never need to diff incremental updates.

use serde::Serialize;

use lumashot_core::shoot::{ShootItem, ShootJob};
use lumashot_core::status::{ItemStatus, JobStatus};
use lumashot_core::types::{DbId, ShootId, Timestamp};

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// Wire view of one item.
#[derive(Debug, Clone, Serialize)]
pub struct ItemSnapshot {
    /// Template slug (the item id within the shoot).
    pub id: String,
    pub name: String,
    pub status: ItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&ShootItem> for ItemSnapshot {
    fn from(item: &ShootItem) -> Self {
        Self {
            id: item.template_id.clone(),
            name: item.display_name.clone(),
            status: item.status,
            output_ref: item.output_ref.clone(),
            error: item.error.clone(),
        }
    }
}

/// Wire view of a whole shoot, used by snapshot reads.
#[derive(Debug, Clone, Serialize)]
pub struct ShootSnapshot {
    pub job_id: ShootId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<DbId>,
    pub source_image_id: ShootId,
    pub style: String,
    pub status: JobStatus,
    pub progress: u32,
    pub total: u32,
    pub created_at: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub items: Vec<ItemSnapshot>,
}

impl From<&ShootJob> for ShootSnapshot {
    fn from(job: &ShootJob) -> Self {
        Self {
            job_id: job.id,
            user_id: job.user_id,
            source_image_id: job.source_image_id,
            style: job.style.clone(),
            status: job.status,
            progress: job.progress,
            total: job.total(),
            created_at: job.created_at,
            error_message: job.error_message.clone(),
            items: job.items.iter().map(ItemSnapshot::from).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// One event on a shoot's progress stream.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ShootEvent {
    /// Stream opener, emitted exactly once per live subscription.
    Started { job_id: ShootId, total: u32 },

    /// Emitted when the settled-item count advanced since the last
    /// emission. Coalesced: a burst of signals produces one event.
    Progress {
        job_id: ShootId,
        progress: u32,
        total: u32,
        items: Vec<ItemSnapshot>,
    },

    /// Stream closer, emitted exactly once with the terminal status.
    Completed {
        job_id: ShootId,
        status: JobStatus,
        progress: u32,
        total: u32,
        items: Vec<ItemSnapshot>,
    },
}

impl ShootEvent {
    pub fn started(job: &ShootJob) -> Self {
        ShootEvent::Started {
            job_id: job.id,
            total: job.total(),
        }
    }

    pub fn progress(job: &ShootJob) -> Self {
        ShootEvent::Progress {
            job_id: job.id,
            progress: job.progress,
            total: job.total(),
            items: job.items.iter().map(ItemSnapshot::from).collect(),
        }
    }

    pub fn completed(job: &ShootJob) -> Self {
        ShootEvent::Completed {
            job_id: job.id,
            status: job.status,
            progress: job.progress,
            total: job.total(),
            items: job.items.iter().map(ItemSnapshot::from).collect(),
        }
    }

    /// Event name used on the SSE frame.
    pub fn kind(&self) -> &'static str {
        match self {
            ShootEvent::Started { .. } => "started",
            ShootEvent::Progress { .. } => "progress",
            ShootEvent::Completed { .. } => "completed",
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use lumashot_core::catalog;
    use lumashot_core::shoot::{ItemOutcome, ShootOptions};

    fn sample_job() -> ShootJob {
        let templates = vec![
            catalog::find("studio-portrait").unwrap(),
            catalog::find("neon-night").unwrap(),
        ];
        ShootJob::build(
            uuid::Uuid::now_v7(),
            None,
            String::new(),
            &templates,
            ShootOptions::default(),
        )
    }

    #[test]
    fn started_event_serializes_with_type_tag() {
        let job = sample_job();
        let json = serde_json::to_value(ShootEvent::started(&job)).unwrap();
        assert_eq!(json["type"], "started");
        assert_eq!(json["total"], 2);
        assert_eq!(json["job_id"], job.id.to_string());
    }

    #[test]
    fn progress_event_carries_full_item_list() {
        let mut job = sample_job();
        job.settle_item(
            "studio-portrait",
            ItemOutcome::Completed {
                output_ref: "a.png".to_string(),
            },
        )
        .unwrap();

        let json = serde_json::to_value(ShootEvent::progress(&job)).unwrap();
        assert_eq!(json["type"], "progress");
        assert_eq!(json["progress"], 1);
        assert_eq!(json["items"].as_array().unwrap().len(), 2);
        assert_eq!(json["items"][0]["status"], "completed");
        assert_eq!(json["items"][0]["output_ref"], "a.png");
        // The pending item serializes without output_ref or error keys.
        assert!(json["items"][1].get("output_ref").is_none());
        assert!(json["items"][1].get("error").is_none());
    }

    #[test]
    fn completed_event_includes_terminal_status() {
        let mut job = sample_job();
        job.settle_item(
            "studio-portrait",
            ItemOutcome::Completed {
                output_ref: "a.png".to_string(),
            },
        )
        .unwrap();
        job.settle_item(
            "neon-night",
            ItemOutcome::Failed {
                error: "provider error".to_string(),
            },
        )
        .unwrap();
        job.finalize();

        let json = serde_json::to_value(ShootEvent::completed(&job)).unwrap();
        assert_eq!(json["type"], "completed");
        assert_eq!(json["status"], "partial");
        assert_eq!(json["progress"], 2);
        assert_eq!(json["items"][1]["error"], "provider error");
    }

    #[test]
    fn event_kinds_match_sse_names() {
        let job = sample_job();
        assert_eq!(ShootEvent::started(&job).kind(), "started");
        assert_eq!(ShootEvent::progress(&job).kind(), "progress");
        assert_eq!(ShootEvent::completed(&job).kind(), "completed");
    }

    #[test]
    fn snapshot_mirrors_job_fields() {
        let job = sample_job();
        let snap = ShootSnapshot::from(&job);
        assert_eq!(snap.job_id, job.id);
        assert_eq!(snap.total, 2);
        assert_eq!(snap.progress, 0);
        assert_eq!(snap.items.len(), 2);
    }
}
