//! Per-project similarity index.
//!
//! Each run gets its own small vector index built from the raw decomposition
//! items. Automated tasks query it for context before calling the model.
//!
//! ## Components
//!
//! - [`IndexStore`] - persistence of built indexes (file or memory)
//! - [`ContextRetriever`] - builds indexes and answers nearest-neighbour queries

mod retriever;
mod store;

pub use retriever::ContextRetriever;
pub use store::{FileIndexStore, MemoryIndexStore};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::ai::AIError;
use crate::core::ProjectId;

/// One indexed snippet and its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedDocument {
    pub content: String,
    pub embedding: Vec<f32>,
}

/// The built index of one project run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectIndex {
    pub project_id: ProjectId,
    /// Name of the embedder that produced the vectors
    pub embedder: String,
    pub documents: Vec<IndexedDocument>,
}

impl ProjectIndex {
    /// Return up to `k` documents closest to `query`, nearest first.
    ///
    /// Distance is squared Euclidean; ties keep insertion order. Documents
    /// whose dimension differs from the query are skipped.
    pub fn nearest(&self, query: &[f32], k: usize) -> Vec<&IndexedDocument> {
        let mut scored: Vec<(f32, usize)> = self
            .documents
            .iter()
            .enumerate()
            .filter(|(_, doc)| doc.embedding.len() == query.len())
            .map(|(i, doc)| (squared_distance(&doc.embedding, query), i))
            .collect();

        scored.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        scored.into_iter().take(k).map(|(_, i)| &self.documents[i]).collect()
    }
}

fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Storage for project indexes.
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Save (or replace) the index of a project.
    async fn save(&self, index: &ProjectIndex) -> Result<(), IndexError>;

    /// Load a project index, or `None` if it was never built.
    async fn load(&self, project_id: ProjectId) -> Result<Option<ProjectIndex>, IndexError>;
}

/// Index error types.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt index: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Embedding failed: {0}")]
    Embedding(#[from] AIError),

    #[error("Expected {expected} embeddings, got {actual}")]
    EmbeddingCount { expected: usize, actual: usize },
}
