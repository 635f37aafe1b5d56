//! Index persistence backends.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{IndexError, IndexStore, ProjectIndex};
use crate::core::ProjectId;

/// Stores each project index as `{dir}/{project_id}.index.json`.
#[derive(Debug, Clone)]
pub struct FileIndexStore {
    dir: PathBuf,
}

impl FileIndexStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, project_id: ProjectId) -> PathBuf {
        self.dir.join(format!("{project_id}.index.json"))
    }
}

#[async_trait]
impl IndexStore for FileIndexStore {
    async fn save(&self, index: &ProjectIndex) -> Result<(), IndexError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let content = serde_json::to_vec(index)?;
        tokio::fs::write(self.path(index.project_id), content).await?;
        Ok(())
    }

    async fn load(&self, project_id: ProjectId) -> Result<Option<ProjectIndex>, IndexError> {
        match tokio::fs::read(self.path(project_id)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Keeps indexes in memory for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemoryIndexStore {
    indexes: RwLock<HashMap<ProjectId, ProjectIndex>>,
}

impl MemoryIndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored indexes.
    pub fn len(&self) -> usize {
        self.indexes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.read().is_empty()
    }
}

#[async_trait]
impl IndexStore for MemoryIndexStore {
    async fn save(&self, index: &ProjectIndex) -> Result<(), IndexError> {
        self.indexes.write().insert(index.project_id, index.clone());
        Ok(())
    }

    async fn load(&self, project_id: ProjectId) -> Result<Option<ProjectIndex>, IndexError> {
        Ok(self.indexes.read().get(&project_id).cloned())
    }
}
