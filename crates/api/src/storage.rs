//! Flat-file storage for source images and generated artifacts.
//!
//! Layout under the configured data dir:
//!
//! ```text
//! sources/{uuid}.png               uploaded source images
//! artifacts/{shoot_id}/{file}      generated outputs, one per item or variant
//! ```
//!
//! Artifact references are the `{shoot_id}/{file}` suffix, served back
//! via `GET /api/v1/artifacts/{shoot_id}/{file}`.

use std::io;
use std::path::PathBuf;

use uuid::Uuid;

/// File-system store rooted at the configured data directory.
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the storage directories if they do not exist.
    pub async fn init(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(self.root.join("sources")).await?;
        tokio::fs::create_dir_all(self.root.join("artifacts")).await
    }

    // -- Source images --

    /// Store an uploaded source image, returning its new id.
    pub async fn store_source(&self, bytes: &[u8]) -> io::Result<Uuid> {
        let id = Uuid::now_v7();
        tokio::fs::write(self.source_path(id), bytes).await?;
        Ok(id)
    }

    pub async fn source_exists(&self, id: Uuid) -> bool {
        tokio::fs::try_exists(self.source_path(id))
            .await
            .unwrap_or(false)
    }

    pub async fn read_source(&self, id: Uuid) -> io::Result<Vec<u8>> {
        tokio::fs::read(self.source_path(id)).await
    }

    // -- Generated artifacts --

    /// Store a generated artifact and return its reference.
    ///
    /// Item outputs are named `{template_id}.png`; variant outputs get a
    /// `.v{index}` infix so they never collide with the main output.
    pub async fn store_artifact(
        &self,
        shoot_id: Uuid,
        template_id: &str,
        variant_index: Option<u32>,
        bytes: &[u8],
    ) -> io::Result<String> {
        let file = match variant_index {
            Some(index) => format!("{template_id}.v{index}.png"),
            None => format!("{template_id}.png"),
        };
        let dir = self.root.join("artifacts").join(shoot_id.to_string());
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(&file), bytes).await?;
        Ok(format!("{shoot_id}/{file}"))
    }

    /// Read an artifact by its `{shoot_id}/{file}` reference.
    pub async fn read_artifact(&self, reference: &str) -> io::Result<Vec<u8>> {
        let path = self.artifact_path(reference)?;
        tokio::fs::read(path).await
    }

    fn source_path(&self, id: Uuid) -> PathBuf {
        self.root.join("sources").join(format!("{id}.png"))
    }

    /// Resolve an artifact reference, rejecting anything that could
    /// escape the artifacts directory.
    fn artifact_path(&self, reference: &str) -> io::Result<PathBuf> {
        let valid = !reference.is_empty()
            && !reference.starts_with('/')
            && reference
                .split('/')
                .all(|part| !part.is_empty() && part != "." && part != "..");
        if !valid {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid artifact reference: {reference}"),
            ));
        }
        Ok(self.root.join("artifacts").join(reference))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
