//! Restart-recovery decisions for interrupted shoots.
//!
//! The startup sweep finds shoots the previous process left incomplete
//! and finalizes them. The decision itself is pure: a shoot that settled
//! at least one item before the crash ran partially; one that settled
//! nothing never ran.

use crate::status::JobStatus;

/// Job-level error message written to shoots finalized by the sweep.
pub const INTERRUPTED_JOB_MESSAGE: &str = "Generation was interrupted by a server restart";

/// Item-level error message for items that never settled before the crash.
pub const INTERRUPTED_ITEM_MESSAGE: &str = "Interrupted by a server restart";

/// Terminal status for a shoot found incomplete at startup.
pub fn interrupted_status(progress: u32) -> JobStatus {
    if progress > 0 {
        JobStatus::Partial
    } else {
        JobStatus::Failed
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
