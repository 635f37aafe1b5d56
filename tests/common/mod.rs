//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;

use agentflow::ai::{AIError, CompletionRequest, CompletionService, EmbeddingService, LocalEmbedder};
use agentflow::core::{Config, TaskSnapshot};
use agentflow::index::MemoryIndexStore;
use agentflow::{App, Services};

/// Completion service that answers from a script, in call order.
///
/// Once the script runs out it keeps returning `fallback`.
pub struct ScriptedCompletion {
    replies: Mutex<Vec<Result<String, AIError>>>,
    fallback: String,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedCompletion {
    pub fn new(replies: Vec<&str>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.to_string())).collect()),
            fallback: "done".to_string(),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts.lock().len()
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn complete(&self, request: CompletionRequest) -> Result<String, AIError> {
        let prompt = request.messages.iter().map(|m| m.content.as_str()).collect::<String>();
        self.prompts.lock().push(prompt);

        let mut replies = self.replies.lock();
        if replies.is_empty() {
            Ok(self.fallback.clone())
        } else {
            replies.remove(0)
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Embedding service that always fails.
pub struct BrokenEmbedder;

#[async_trait]
impl EmbeddingService for BrokenEmbedder {
    async fn embed(&self, _inputs: &[String]) -> Result<Vec<Vec<f32>>, AIError> {
        Err(AIError::EmptyEmbeddings)
    }

    fn name(&self) -> &str {
        "broken"
    }
}

/// An application wired to scripted collaborators and a temporary data dir.
pub struct TestApp {
    pub app: App,
    pub completion: Arc<ScriptedCompletion>,
    pub index_store: Arc<MemoryIndexStore>,
    pub data_dir: TempDir,
}

pub fn test_app(replies: Vec<&str>) -> TestApp {
    test_app_with_embedder(replies, Arc::new(LocalEmbedder::new()))
}

pub fn test_app_with_embedder(replies: Vec<&str>, embedder: Arc<dyn EmbeddingService>) -> TestApp {
    let data_dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.storage.data_dir = data_dir.path().to_path_buf();
    config.engine.human_delay_ms = 0;

    let completion = ScriptedCompletion::new(replies);
    let index_store = Arc::new(MemoryIndexStore::new());
    let services = Services {
        completion: completion.clone(),
        embedder,
        index_store: index_store.clone(),
    };

    TestApp { app: App::with_services(config, services), completion, index_store, data_dir }
}

/// Wait for the next broadcast batch, failing the test after a few seconds.
pub async fn next_batch(
    receiver: &mut tokio::sync::mpsc::UnboundedReceiver<String>,
) -> Vec<TaskSnapshot> {
    let payload = tokio::time::timeout(Duration::from_secs(5), receiver.recv())
        .await
        .expect("timed out waiting for broadcast")
        .expect("hub closed");
    serde_json::from_str(&payload).unwrap()
}

/// Poll `check` until it holds, failing the test after a few seconds.
pub async fn eventually(mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !check() {
        assert!(tokio::time::Instant::now() < deadline, "condition not met in time");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
