//! Context retrieval over project indexes.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use super::{IndexError, IndexStore, IndexedDocument, ProjectIndex};
use crate::ai::{AIError, EmbeddingService};
use crate::core::ProjectId;

/// Builds project indexes and answers relevance queries against them.
#[derive(Clone)]
pub struct ContextRetriever {
    store: Arc<dyn IndexStore>,
    embedder: Arc<dyn EmbeddingService>,
}

impl std::fmt::Debug for ContextRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextRetriever").field("embedder", &self.embedder.name()).finish()
    }
}

impl ContextRetriever {
    pub fn new(store: Arc<dyn IndexStore>, embedder: Arc<dyn EmbeddingService>) -> Self {
        Self { store, embedder }
    }

    /// Build (or rebuild) the index of a project from its raw decomposition items.
    ///
    /// Each item is stored as its JSON text. Returns the number of indexed
    /// documents; an empty item list is a no-op.
    pub async fn build(&self, project_id: ProjectId, items: &[Value]) -> Result<usize, IndexError> {
        if items.is_empty() {
            warn!(%project_id, "No items to index");
            return Ok(0);
        }

        let contents: Vec<String> = items.iter().map(Value::to_string).collect();
        let embeddings = self.embedder.embed(&contents).await?;
        if embeddings.len() != contents.len() {
            return Err(IndexError::EmbeddingCount {
                expected: contents.len(),
                actual: embeddings.len(),
            });
        }

        let documents: Vec<IndexedDocument> = contents
            .into_iter()
            .zip(embeddings)
            .map(|(content, embedding)| IndexedDocument { content, embedding })
            .collect();
        let count = documents.len();

        let index =
            ProjectIndex { project_id, embedder: self.embedder.name().to_string(), documents };
        self.store.save(&index).await?;

        info!(%project_id, documents = count, embedder = self.embedder.name(), "Project index built");
        Ok(count)
    }

    /// Return up to `k` indexed snippets most relevant to `query`, best first.
    ///
    /// A project without an index yields an empty list.
    pub async fn search(
        &self,
        project_id: ProjectId,
        query: &str,
        k: usize,
    ) -> Result<Vec<String>, IndexError> {
        let Some(index) = self.store.load(project_id).await? else {
            debug!(%project_id, "No index for project");
            return Ok(Vec::new());
        };
        if k == 0 || index.documents.is_empty() {
            return Ok(Vec::new());
        }

        let vectors = self.embedder.embed(&[query.to_string()]).await?;
        let query_vector = vectors.into_iter().next().ok_or(AIError::EmptyEmbeddings)?;

        Ok(index.nearest(&query_vector, k).into_iter().map(|doc| doc.content.clone()).collect())
    }

    /// Concatenate the top `k` snippets into a context block.
    ///
    /// Never fails: a missing index or an unreachable embedder produces an
    /// empty string so the calling task can proceed without context.
    pub async fn retrieve(&self, project_id: ProjectId, query: &str, k: usize) -> String {
        match self.search(project_id, query, k).await {
            Ok(snippets) => snippets.join("\n"),
            Err(e) => {
                warn!(%project_id, error = %e, "Context retrieval failed, continuing without context");
                String::new()
            }
        }
    }

    /// Query matches decoded back into JSON records.
    pub async fn query_records(
        &self,
        project_id: ProjectId,
        query: &str,
        k: usize,
    ) -> Result<Vec<Value>, IndexError> {
        let snippets = self.search(project_id, query, k).await?;
        Ok(snippets
            .into_iter()
            .map(|s| serde_json::from_str(&s).unwrap_or(Value::String(s)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;
    use uuid::Uuid;

    use super::*;
    use crate::ai::LocalEmbedder;
    use crate::index::MemoryIndexStore;

    struct BrokenEmbedder;

    #[async_trait]
    impl EmbeddingService for BrokenEmbedder {
        async fn embed(&self, _inputs: &[String]) -> Result<Vec<Vec<f32>>, AIError> {
            Err(AIError::EmptyEmbeddings)
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    fn retriever() -> (ContextRetriever, Arc<MemoryIndexStore>) {
        let store = Arc::new(MemoryIndexStore::new());
        (ContextRetriever::new(store.clone(), Arc::new(LocalEmbedder::new())), store)
    }

    fn items() -> Vec<Value> {
        vec![
            json!({"title": "Design login form layout", "routed_to": "ai"}),
            json!({"title": "Set up payment provider account", "routed_to": "human"}),
            json!({"title": "Write login form validation", "routed_to": "ai"}),
        ]
    }

    #[tokio::test]
    async fn test_retrieve_without_index_is_empty() {
        let (retriever, _) = retriever();
        assert_eq!(retriever.retrieve(Uuid::new_v4(), "login", 4).await, "");
    }

    #[tokio::test]
    async fn test_build_empty_is_noop() {
        let (retriever, store) = retriever();
        assert_eq!(retriever.build(Uuid::new_v4(), &[]).await.unwrap(), 0);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_search_ranks_relevant_items_first() {
        let (retriever, _) = retriever();
        let project = Uuid::new_v4();
        assert_eq!(retriever.build(project, &items()).await.unwrap(), 3);

        let hits = retriever.search(project, "payment provider account", 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].contains("payment"));
    }

    #[tokio::test]
    async fn test_retrieve_joins_with_newlines() {
        let (retriever, _) = retriever();
        let project = Uuid::new_v4();
        retriever.build(project, &items()).await.unwrap();

        let context = retriever.retrieve(project, "login form", 2).await;
        assert_eq!(context.lines().count(), 2);
        assert!(context.lines().all(|line| line.contains("login")));
    }

    #[tokio::test]
    async fn test_query_records_decode_json() {
        let (retriever, _) = retriever();
        let project = Uuid::new_v4();
        retriever.build(project, &items()).await.unwrap();

        let records = retriever.query_records(project, "login", 3).await.unwrap();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.get("title").is_some()));
    }

    #[tokio::test]
    async fn test_retrieve_swallows_embedding_errors() {
        let store = Arc::new(MemoryIndexStore::new());
        let project = Uuid::new_v4();
        ContextRetriever::new(store.clone(), Arc::new(LocalEmbedder::new()))
            .build(project, &items())
            .await
            .unwrap();

        let broken = ContextRetriever::new(store, Arc::new(BrokenEmbedder));
        assert_eq!(broken.retrieve(project, "login", 4).await, "");
        assert!(broken.search(project, "login", 4).await.is_err());
    }
}
