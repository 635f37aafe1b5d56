//! On-disk storage for raw decomposition output.
//!
//! One pretty-printed JSON file per project run, overwritten on every save.

use std::io;
use std::path::PathBuf;

use serde_json::Value;

use super::task::ProjectId;

/// Errors from the artifact store.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Corrupt artifact for project {project}: {source}")]
    Corrupt { project: ProjectId, source: serde_json::Error },
}

/// Directory-backed store of raw decomposition artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    /// Create a store rooted at `dir`. The directory is created lazily.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the raw artifact for a project.
    pub fn raw_path(&self, project_id: ProjectId) -> PathBuf {
        self.dir.join(format!("{project_id}.json"))
    }

    /// Persist the raw decomposition, replacing any previous version.
    pub async fn save_raw(&self, project_id: ProjectId, raw: &Value) -> Result<PathBuf, ArtifactError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.raw_path(project_id);
        let content = serde_json::to_string_pretty(raw)
            .map_err(|source| ArtifactError::Corrupt { project: project_id, source })?;
        tokio::fs::write(&path, content).await?;

        tracing::debug!(%project_id, path = %path.display(), "Saved raw decomposition");
        Ok(path)
    }

    /// Load the raw decomposition, or `None` if the run never persisted one.
    pub async fn load_raw(&self, project_id: ProjectId) -> Result<Option<Value>, ArtifactError> {
        let path = self.raw_path(project_id);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| ArtifactError::Corrupt { project: project_id, source })
    }
}
