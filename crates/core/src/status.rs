//! Shoot and item status enums plus the aggregate-status computation.
//!
//! Statuses are closed enums; the numeric ids match the seed order of the
//! `shoot_statuses` / `shoot_item_statuses` lookup tables in the shadow
//! database, so `id()` / `from_id()` round-trip through persistence.

use serde::{Deserialize, Serialize};

/// Status ID type matching SMALLINT in the shadow database.
pub type StatusId = i16;

// ---------------------------------------------------------------------------
// Job status
// ---------------------------------------------------------------------------

/// Lifecycle status of a whole shoot.
///
/// `Pending -> Starting -> Running -> {Completed | Partial | Failed}`.
/// The `Pending -> Starting` edge is the single-flight guard: it is taken
/// at most once per shoot, and a second concurrent claim is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i16)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending = 1,
    Starting = 2,
    Running = 3,
    Completed = 4,
    Partial = 5,
    Failed = 6,
}

impl JobStatus {
    /// Database status id.
    pub fn id(self) -> StatusId {
        self as StatusId
    }

    /// Inverse of [`id`](Self::id); `None` for unknown ids.
    pub fn from_id(id: StatusId) -> Option<Self> {
        match id {
            1 => Some(JobStatus::Pending),
            2 => Some(JobStatus::Starting),
            3 => Some(JobStatus::Running),
            4 => Some(JobStatus::Completed),
            5 => Some(JobStatus::Partial),
            6 => Some(JobStatus::Failed),
            _ => None,
        }
    }

    /// A terminal shoot never transitions again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Partial | JobStatus::Failed
        )
    }
}

// ---------------------------------------------------------------------------
// Item status
// ---------------------------------------------------------------------------

/// Lifecycle status of a single item within a shoot.
///
/// `Pending -> Generating -> {Completed | Failed}`. The internal retry of a
/// failed provider call is not a distinct state: an item stays `Generating`
/// until the outcome of its final attempt is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i16)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending = 1,
    Generating = 2,
    Completed = 3,
    Failed = 4,
}

impl ItemStatus {
    /// Database status id.
    pub fn id(self) -> StatusId {
        self as StatusId
    }

    /// Inverse of [`id`](Self::id); `None` for unknown ids.
    pub fn from_id(id: StatusId) -> Option<Self> {
        match id {
            1 => Some(ItemStatus::Pending),
            2 => Some(ItemStatus::Generating),
            3 => Some(ItemStatus::Completed),
            4 => Some(ItemStatus::Failed),
            _ => None,
        }
    }

    /// An item is settled once it reached `Completed` or `Failed`.
    pub fn is_settled(self) -> bool {
        matches!(self, ItemStatus::Completed | ItemStatus::Failed)
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Compute the terminal shoot status from the statuses of its items.
///
/// - `Completed` iff every item completed.
/// - `Failed` iff no item completed.
/// - `Partial` otherwise (at least one completed, at least one not).
///
/// Only meaningful once every item has settled; callers invoke this after
/// the fan-out has been awaited to completion.
pub fn aggregate_status<I>(items: I) -> JobStatus
where
    I: IntoIterator<Item = ItemStatus>,
{
    let mut completed = 0usize;
    let mut total = 0usize;
    for status in items {
        total += 1;
        match status {
            ItemStatus::Completed => completed += 1,
            ItemStatus::Pending | ItemStatus::Generating | ItemStatus::Failed => {}
        }
    }

    if completed == total {
        JobStatus::Completed
    } else if completed == 0 {
        JobStatus::Failed
    } else {
        JobStatus::Partial
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
