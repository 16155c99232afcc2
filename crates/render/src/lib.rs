//! HTTP client for the external AI image-rendering service.
//!
//! Exposes the [`ImageProvider`] trait the orchestrator generates
//! through, and [`client::RenderClient`], the reqwest-backed
//! implementation that talks to the real service. Retry policy lives in
//! the orchestrator, never here: one call, one request.

pub mod client;

pub use client::{RenderClient, RenderError};

/// One image generation, as the orchestrator sees it.
///
/// Implementations perform exactly one provider request per call and
/// surface any failure as a [`RenderError`]; the caller owns retries.
#[async_trait::async_trait]
pub trait ImageProvider: Send + Sync {
    /// Render `source_image` into the scene described by `prompt`,
    /// returning the artifact bytes.
    async fn generate(
        &self,
        source_image: &[u8],
        prompt: &str,
        aspect_ratio: &str,
    ) -> Result<Vec<u8>, RenderError>;
}
