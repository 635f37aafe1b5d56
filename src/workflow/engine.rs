//! Execution engine.
//!
//! A single consumer drains the work queue in FIFO order. Each task is fully
//! processed (started, dispatched, finished) before the next one is taken, so
//! per-task notifications are always ordered `in_progress` then `done` or
//! `failed`.
//!
//! Dispatch failures end the task in `failed`. Unless `halt_on_error` is set,
//! the engine then moves on to the next queued task.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::ai::{AIError, CompletionRequest, CompletionService};
use crate::core::{
    Config, ExecutorKind, RegistryError, Task, TaskId, TaskRegistry, TaskStatus,
};
use crate::hub::NotificationHub;
use crate::index::ContextRetriever;

/// Engine error types.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Registry rejected update: {0}")]
    Registry(#[from] RegistryError),

    #[error("Completion call failed: {0}")]
    Completion(#[from] AIError),
}

/// Tunables for task execution.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Simulated latency of human tasks
    pub human_delay: Duration,
    /// Number of context snippets retrieved for automated tasks
    pub retrieval_k: usize,
    /// Stop consuming after the first failed task
    pub halt_on_error: bool,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            human_delay: config.engine.human_delay(),
            retrieval_k: config.engine.retrieval_k,
            halt_on_error: config.engine.halt_on_error,
            temperature: config.llm.task_temperature,
            max_tokens: config.llm.task_max_tokens,
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// The single-consumer task execution loop.
#[derive(Clone)]
pub struct Engine {
    registry: Arc<TaskRegistry>,
    hub: Arc<NotificationHub>,
    completion: Arc<dyn CompletionService>,
    retriever: ContextRetriever,
    settings: EngineSettings,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("completion", &self.completion.name())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Engine {
    pub fn new(
        registry: Arc<TaskRegistry>,
        hub: Arc<NotificationHub>,
        completion: Arc<dyn CompletionService>,
        retriever: ContextRetriever,
        settings: EngineSettings,
    ) -> Self {
        Self { registry, hub, completion, retriever, settings }
    }

    /// Run the loop on a background task until the queue closes.
    pub fn spawn(self, queue: UnboundedReceiver<TaskId>) -> JoinHandle<()> {
        tokio::spawn(self.run(queue))
    }

    /// Consume task ids until every sender is dropped.
    pub async fn run(self, mut queue: UnboundedReceiver<TaskId>) {
        info!("Execution engine started");

        while let Some(task_id) = queue.recv().await {
            match self.process(task_id).await {
                Ok(task) if task.status == TaskStatus::Failed && self.settings.halt_on_error => {
                    error!(%task_id, "Task failed, halting engine");
                    break;
                }
                Ok(_) => {}
                Err(e) => error!(%task_id, error = %e, "Task processing aborted"),
            }
        }

        info!("Execution engine stopped");
    }

    /// Take one task from `queued` to a terminal state.
    ///
    /// A failed dispatch is not an error here: the task is returned in
    /// `failed`. Errors are reserved for registry rejections, which abort the
    /// task where it stands.
    pub async fn process(&self, task_id: TaskId) -> Result<Task, EngineError> {
        let task = self.registry.transition(task_id, TaskStatus::InProgress)?;
        self.hub.broadcast(&[task.snapshot()]);
        info!(%task_id, project_id = %task.project_id, executor = %task.executor_kind, "Task started");

        let finished = match self.dispatch(&task).await {
            Ok(result) => self.registry.complete(task_id, result)?,
            Err(e) => {
                warn!(%task_id, error = %e, "Task dispatch failed");
                self.registry.fail(task_id, e.to_string())?
            }
        };
        self.hub.broadcast(&[finished.snapshot()]);
        info!(%task_id, status = %finished.status, "Task finished");

        Ok(finished)
    }

    async fn dispatch(&self, task: &Task) -> Result<String, EngineError> {
        match task.executor_kind {
            ExecutorKind::Automated => {
                let context = self
                    .retriever
                    .retrieve(task.project_id, &task.title, self.settings.retrieval_k)
                    .await;
                debug!(task_id = %task.id, context_len = context.len(), "Context retrieved");

                let request = CompletionRequest::prompt(
                    task_prompt(&context, &task.title),
                    self.settings.temperature,
                    self.settings.max_tokens,
                );
                let reply = self.completion.complete(request).await?;
                Ok(reply.trim().to_string())
            }
            ExecutorKind::Human => {
                tokio::time::sleep(self.settings.human_delay).await;
                Ok(human_result(&task.owner, &task.title))
            }
        }
    }
}

/// Prompt for an automated task: retrieved context, then the task title.
pub fn task_prompt(context: &str, title: &str) -> String {
    format!("{context}\n\n### TASK\n{title}")
}

/// Canned outcome of a simulated human task.
pub fn human_result(owner: &str, title: &str) -> String {
    format!("{owner} finished: {title}")
}
