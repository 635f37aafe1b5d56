//! Intake pipeline.
//!
//! Each submitted brief is processed on its own background task:
//! decompose, persist the raw reply, index it, create and announce the tasks,
//! then hand them to the engine. Failures are logged and recorded on the run;
//! the submitter has already been answered.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::assign::Assigner;
use super::decompose::{Decomposer, DecompositionError};
use crate::core::{
    ArtifactError, ArtifactStore, ProjectId, RunStatus, Task, TaskId, TaskRegistry,
};
use crate::hub::NotificationHub;
use crate::index::ContextRetriever;

/// Intake error types.
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("Decomposition failed: {0}")]
    Decomposition(#[from] DecompositionError),

    #[error("Failed to persist raw decomposition: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("Execution queue is closed")]
    QueueClosed,
}

/// Turns briefs into queued tasks.
#[derive(Debug, Clone)]
pub struct IntakePipeline {
    decomposer: Decomposer,
    assigner: Assigner,
    registry: Arc<TaskRegistry>,
    artifacts: ArtifactStore,
    retriever: ContextRetriever,
    hub: Arc<NotificationHub>,
    queue: UnboundedSender<TaskId>,
}

impl IntakePipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        decomposer: Decomposer,
        assigner: Assigner,
        registry: Arc<TaskRegistry>,
        artifacts: ArtifactStore,
        retriever: ContextRetriever,
        hub: Arc<NotificationHub>,
        queue: UnboundedSender<TaskId>,
    ) -> Self {
        Self { decomposer, assigner, registry, artifacts, retriever, hub, queue }
    }

    /// Accept a brief and process it in the background.
    ///
    /// Returns the new project id immediately.
    pub fn submit(&self, brief: String) -> ProjectId {
        let project_id = Uuid::new_v4();
        self.registry.open_run(project_id);
        info!(%project_id, bytes = brief.len(), "Brief accepted");

        let pipeline = self.clone();
        tokio::spawn(async move {
            // Errors are already logged and recorded on the run.
            let _ = pipeline.process(project_id, &brief).await;
        });

        project_id
    }

    /// Run the full pipeline for one brief, returning the created tasks.
    pub async fn process(
        &self,
        project_id: ProjectId,
        brief: &str,
    ) -> Result<Vec<Task>, IntakeError> {
        self.registry.open_run(project_id);

        match self.run_stages(project_id, brief).await {
            Ok(tasks) => Ok(tasks),
            Err(e) => {
                error!(%project_id, error = %e, "Intake pipeline abandoned");
                let failed = RunStatus::Failed { reason: e.to_string() };
                self.record_status(project_id, failed);
                Err(e)
            }
        }
    }

    async fn run_stages(
        &self,
        project_id: ProjectId,
        brief: &str,
    ) -> Result<Vec<Task>, IntakeError> {
        self.record_status(project_id, RunStatus::Decomposing);
        let decomposition = self.decomposer.decompose(project_id, brief).await?;

        let path = self.artifacts.save_raw(project_id, &decomposition.raw).await?;
        info!(%project_id, path = %path.display(), "Raw decomposition saved");

        let raw_items = decomposition.raw.as_array().map(Vec::as_slice).unwrap_or_default();
        if let Err(e) = self.retriever.build(project_id, raw_items).await {
            warn!(%project_id, error = %e, "Index build failed, tasks will run without context");
        }

        let tasks: Vec<Task> = decomposition
            .items
            .iter()
            .map(|item| {
                let (kind, owner) = self.assigner.assign(item);
                self.registry.create(project_id, &item.title, kind, owner, item.rationale.clone())
            })
            .collect();
        self.record_status(project_id, RunStatus::Running);

        let snapshots: Vec<_> = tasks.iter().map(Task::snapshot).collect();
        self.hub.broadcast(&snapshots);

        for task in &tasks {
            self.queue.send(task.id).map_err(|_| IntakeError::QueueClosed)?;
        }

        info!(%project_id, tasks = tasks.len(), "Tasks queued");
        Ok(tasks)
    }

    fn record_status(&self, project_id: ProjectId, status: RunStatus) {
        if let Err(e) = self.registry.set_run_status(project_id, status) {
            warn!(%project_id, error = %e, "Failed to record run status");
        }
    }
}
