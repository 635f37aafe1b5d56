//! Application wiring and lifecycle.
//!
//! `App` builds every collaborator once from the configuration and hands
//! them to the components that need them. Nothing is looked up globally.

use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;

use crate::ai::{
    AIError, CompletionService, EmbeddingFlavor, EmbeddingService, LocalEmbedder,
    OpenAICompatProvider, RemoteEmbedder,
};
use crate::api::{self, AppState};
use crate::core::{
    ArtifactStore, Config, EmbeddingProvider, EmbeddingsConfig, TaskId, TaskRegistry,
};
use crate::hub::NotificationHub;
use crate::index::{ContextRetriever, FileIndexStore, IndexStore};
use crate::workflow::{Assigner, Decomposer, Engine, EngineSettings, IntakePipeline};

/// External collaborators used by the workflow.
#[derive(Clone)]
pub struct Services {
    pub completion: Arc<dyn CompletionService>,
    pub embedder: Arc<dyn EmbeddingService>,
    pub index_store: Arc<dyn IndexStore>,
}

impl Services {
    /// Build the HTTP-backed collaborators described by the configuration.
    pub fn from_config(config: &Config) -> Result<Self, AIError> {
        Ok(Self {
            completion: Arc::new(OpenAICompatProvider::from_config(&config.llm)?),
            embedder: embedder_from_config(&config.embeddings)?,
            index_store: Arc::new(FileIndexStore::new(&config.storage.data_dir)),
        })
    }
}

/// Pick the embedding backend named by the configuration.
pub fn embedder_from_config(
    config: &EmbeddingsConfig,
) -> Result<Arc<dyn EmbeddingService>, AIError> {
    let embedder: Arc<dyn EmbeddingService> = match config.provider {
        EmbeddingProvider::Local => Arc::new(LocalEmbedder::new()),
        EmbeddingProvider::OpenAI => {
            Arc::new(RemoteEmbedder::from_config(EmbeddingFlavor::OpenAI, config)?)
        }
        EmbeddingProvider::RunPod => {
            Arc::new(RemoteEmbedder::from_config(EmbeddingFlavor::RunPod, config)?)
        }
    };
    Ok(embedder)
}

/// Main application state.
pub struct App {
    /// Application configuration
    pub config: Config,
    pub registry: Arc<TaskRegistry>,
    pub hub: Arc<NotificationHub>,
    pub retriever: ContextRetriever,
    pub artifacts: ArtifactStore,
    pub decomposer: Decomposer,
    pub intake: IntakePipeline,
    engine: Engine,
    /// Receiving end of the work queue, until the engine takes it
    queue: Option<UnboundedReceiver<TaskId>>,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("registry", &self.registry)
            .field("engine_started", &self.queue.is_none())
            .finish_non_exhaustive()
    }
}

impl App {
    /// Create the application from configuration.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let services = Services::from_config(&config)?;
        Ok(Self::with_services(config, services))
    }

    /// Create the application around explicit collaborators.
    pub fn with_services(config: Config, services: Services) -> Self {
        let registry = Arc::new(TaskRegistry::new());
        let hub = Arc::new(NotificationHub::new());
        let retriever = ContextRetriever::new(services.index_store, services.embedder);
        let artifacts = ArtifactStore::new(&config.storage.data_dir);
        let decomposer = Decomposer::new(
            services.completion.clone(),
            config.llm.decompose_temperature,
            config.llm.decompose_max_tokens,
        );
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();

        let intake = IntakePipeline::new(
            decomposer.clone(),
            Assigner::from_config(&config.engine, &config.roster),
            registry.clone(),
            artifacts.clone(),
            retriever.clone(),
            hub.clone(),
            queue_tx,
        );
        let engine = Engine::new(
            registry.clone(),
            hub.clone(),
            services.completion,
            retriever.clone(),
            EngineSettings::from_config(&config),
        );

        Self {
            config,
            registry,
            hub,
            retriever,
            artifacts,
            decomposer,
            intake,
            engine,
            queue: Some(queue_rx),
        }
    }

    /// Start the execution engine. Returns `None` if it is already running.
    pub fn start_engine(&mut self) -> Option<JoinHandle<()>> {
        let queue = self.queue.take()?;
        Some(self.engine.clone().spawn(queue))
    }

    /// Shared state for the HTTP layer.
    pub fn state(&self) -> Arc<AppState> {
        Arc::new(AppState {
            registry: self.registry.clone(),
            hub: self.hub.clone(),
            intake: self.intake.clone(),
            retriever: self.retriever.clone(),
            artifacts: self.artifacts.clone(),
        })
    }

    /// Start the engine and serve HTTP until shutdown.
    pub async fn serve(mut self) -> anyhow::Result<()> {
        let engine = self.start_engine();
        let result = api::serve(self.state(), &self.config.server).await;

        if let Some(handle) = engine {
            handle.abort();
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_requires_llm_endpoint() {
        let err = App::new(Config::default()).unwrap_err();
        assert!(err.downcast_ref::<AIError>().is_some());
    }

    #[test]
    fn test_local_embedder_needs_no_endpoint() {
        let embedder = embedder_from_config(&EmbeddingsConfig::default()).unwrap();
        assert_eq!(embedder.name(), "local");
    }

    #[test]
    fn test_remote_embedder_requires_url() {
        let config =
            EmbeddingsConfig { provider: EmbeddingProvider::RunPod, ..EmbeddingsConfig::default() };
        assert!(embedder_from_config(&config).is_err());
    }

    #[tokio::test]
    async fn test_engine_starts_once() {
        let mut config = Config::default();
        config.llm.base_url = Some("http://127.0.0.1:9".to_string());
        let mut app = App::new(config).unwrap();

        let handle = app.start_engine();
        assert!(handle.is_some());
        assert!(app.start_engine().is_none());
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}
