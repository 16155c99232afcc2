//! Bounded in-memory registry of active shoots.
//!
//! Holds every shoot the process is currently able to mutate, keyed by
//! id. Insertion order is preserved by the backing [`IndexMap`], which is
//! also the eviction order: entries past the TTL go first, then the
//! oldest-inserted entries while the store is over capacity. Eviction is
//! opportunistic on insert and ignores terminality: a finished shoot
//! stays queryable from memory until aged or displaced, and from the
//! persistence shadow indefinitely.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use indexmap::IndexMap;

use lumashot_core::shoot::ShootJob;
use lumashot_core::types::ShootId;
use lumashot_events::ProgressSignal;

/// How long a shoot stays in memory after insertion.
pub const JOB_TTL: Duration = Duration::from_secs(60 * 60);

/// Maximum number of shoots held in memory.
pub const JOB_CAPACITY: usize = 200;

// ---------------------------------------------------------------------------
// JobHandle
// ---------------------------------------------------------------------------

/// Shared handle to one in-memory shoot.
///
/// The mutable state sits behind a `std::sync::Mutex`: every mutation is
/// a short synchronous critical section, never held across an await, so
/// "mark item settled and increment progress" is a single atomic step as
/// seen by all tasks. The attached [`ProgressSignal`] is set after every
/// mutation.
#[derive(Debug)]
pub struct JobHandle {
    id: ShootId,
    inserted_at: Instant,
    state: Mutex<ShootJob>,
    signal: ProgressSignal,
}

impl JobHandle {
    fn new(job: ShootJob) -> Self {
        Self {
            id: job.id,
            inserted_at: Instant::now(),
            state: Mutex::new(job),
            signal: ProgressSignal::new(),
        }
    }

    pub fn id(&self) -> ShootId {
        self.id
    }

    pub fn signal(&self) -> &ProgressSignal {
        &self.signal
    }

    /// Run `f` against the locked shoot state.
    ///
    /// A poisoned lock is recovered rather than propagated: a panicking
    /// item task must not wedge the whole shoot.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut ShootJob) -> R) -> R {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Clone the current shoot state for readers.
    pub fn snapshot(&self) -> ShootJob {
        self.with_state(|job| job.clone())
    }

    fn age(&self) -> Duration {
        self.inserted_at.elapsed()
    }
}

// ---------------------------------------------------------------------------
// TaskStore
// ---------------------------------------------------------------------------

/// Bounded in-memory shoot registry.
///
/// One mutex guards insert, get, and eviction; none of them suspend.
/// Passed around as `Arc<TaskStore>`, constructed once at startup and
/// injected, never a global.
pub struct TaskStore {
    ttl: Duration,
    capacity: usize,
    jobs: Mutex<IndexMap<ShootId, Arc<JobHandle>>>,
}

impl TaskStore {
    /// Store with the production TTL and capacity.
    pub fn new() -> Self {
        Self::with_limits(JOB_TTL, JOB_CAPACITY)
    }

    /// Store with explicit limits (used by tests).
    pub fn with_limits(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity,
            jobs: Mutex::new(IndexMap::new()),
        }
    }

    /// Register a freshly built shoot, evicting stale entries first.
    pub fn insert(&self, job: ShootJob) -> Arc<JobHandle> {
        let handle = Arc::new(JobHandle::new(job));
        let mut jobs = self.lock();

        // Age-based eviction: entries are insertion-ordered, so expired
        // ones cluster at the front.
        loop {
            let expired = jobs
                .get_index(0)
                .is_some_and(|(_, oldest)| oldest.age() > self.ttl);
            if !expired {
                break;
            }
            jobs.shift_remove_index(0);
        }

        // Capacity-based eviction: make room for the incoming entry.
        while jobs.len() >= self.capacity {
            jobs.shift_remove_index(0);
        }

        jobs.insert(handle.id(), Arc::clone(&handle));
        handle
    }

    pub fn get(&self, id: ShootId) -> Option<Arc<JobHandle>> {
        self.lock().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, IndexMap<ShootId, Arc<JobHandle>>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}
