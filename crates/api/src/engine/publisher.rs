//! Progress publisher: turns shoot state changes into an ordered event
//! stream for one subscriber.
//!
//! A pump task polls the shoot's [`ProgressSignal`] with a fixed
//! timeout. Signals coalesce (a burst of mutations wakes the pump once)
//! and a timeout with no progress change emits nothing, so idle periods
//! produce no wire traffic. The stream is `started`, `progress` events
//! whenever the settled count advanced, then exactly one `completed`.
//!
//! A subscriber dropping its receiver only ends the pump; the
//! orchestrator keeps running the shoot to completion server-side.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::task::TaskTracker;

use lumashot_core::shoot::ShootJob;
use lumashot_events::ShootEvent;

use crate::engine::store::JobHandle;

/// How long the pump waits on the signal before taking a heartbeat look
/// at the shoot state anyway.
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Buffered events between the pump and a slow subscriber.
const CHANNEL_CAPACITY: usize = 16;

/// Subscribe to a live shoot.
///
/// The pump task is spawned on the supervised tracker; the returned
/// stream yields events until the terminal one.
pub fn subscribe(handle: Arc<JobHandle>, tracker: &TaskTracker) -> ReceiverStream<ShootEvent> {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    tracker.spawn(pump(handle, tx));
    ReceiverStream::new(rx)
}

/// Single event stream for a shoot that is already terminal.
///
/// No `started` or `progress` events, just one synthetic `completed` built
/// from the final stored state, then the stream closes.
pub fn completed_stream(job: &ShootJob) -> futures::stream::Iter<std::vec::IntoIter<ShootEvent>> {
    futures::stream::iter(vec![ShootEvent::completed(job)])
}

/// Consumer loop: wait, snapshot, coalesce, emit.
async fn pump(handle: Arc<JobHandle>, tx: mpsc::Sender<ShootEvent>) {
    let snapshot = handle.snapshot();
    if tx.send(ShootEvent::started(&snapshot)).await.is_err() {
        return;
    }

    // Emissions are keyed off the settled-item count; item status flips
    // that do not settle anything (pending -> generating) stay silent.
    let mut last_progress = snapshot.progress;

    loop {
        // Woken by the signal or by the heartbeat timeout; either way
        // the snapshot decides what, if anything, to emit.
        let _ = handle.signal().wait(POLL_INTERVAL).await;

        let snapshot = handle.snapshot();
        if snapshot.status.is_terminal() {
            let _ = tx.send(ShootEvent::completed(&snapshot)).await;
            return;
        }
        if snapshot.progress != last_progress {
            last_progress = snapshot.progress;
            if tx.send(ShootEvent::progress(&snapshot)).await.is_err() {
                return;
            }
        }
    }
}
