//! Progress eventing for the lumashot generation platform.
//!
//! Provides the coalescing notification primitive the orchestrator sets
//! on every state change, and the typed JSON events the progress stream
//! delivers to subscribers.

pub mod progress;
pub mod signal;

pub use progress::{ItemSnapshot, ShootEvent, ShootSnapshot};
pub use signal::ProgressSignal;
