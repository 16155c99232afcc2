//! Single-slot, coalescing progress signal.
//!
//! Backed by [`tokio::sync::Notify`], which stores at most one pending
//! permit: any number of [`set`](ProgressSignal::set) calls between two
//! waits collapse into a single wake-up. The publisher polls with a
//! timeout so an idle signal doubles as a heartbeat tick.

use std::time::Duration;

use tokio::sync::Notify;

/// Notification primitive set whenever a shoot's state mutates.
///
/// Many writers, one consumer loop. Writers never block; the consumer
/// waits with a timeout and re-reads the shoot snapshot on every wake.
#[derive(Debug, Default)]
pub struct ProgressSignal {
    notify: Notify,
}

impl ProgressSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the signal. Multiple sets before the next wait coalesce.
    pub fn set(&self) {
        self.notify.notify_one();
    }

    /// Wait up to `window` for the signal.
    ///
    /// Returns `true` if the signal was set (consuming the pending
    /// permit), `false` on timeout. A permit stored before this call is
    /// consumed immediately.
    pub async fn wait(&self, window: Duration) -> bool {
        tokio::time::timeout(window, self.notify.notified())
            .await
            .is_ok()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
