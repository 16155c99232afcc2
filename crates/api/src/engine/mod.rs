//! The generation engine: task store, shadow mirroring, the fan-out
//! orchestrator, the progress publisher, and the startup recovery sweep.

pub mod orchestrator;
pub mod publisher;
pub mod recovery;
pub mod shadow;
pub mod store;
