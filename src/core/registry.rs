//! Task registry: the single source of truth for task and run state.
//!
//! Every mutation happens under one write lock, so readers always observe a
//! task either before or after a transition, never half-way through one.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::task::{ExecutorKind, ProjectId, Task, TaskId, TaskStatus};

/// Errors raised by registry operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Unknown task: {0}")]
    UnknownTask(TaskId),

    #[error("Unknown project run: {0}")]
    UnknownRun(ProjectId),

    #[error("Invalid transition for task {task}: {from} -> {to}")]
    InvalidTransition { task: TaskId, from: TaskStatus, to: TaskStatus },

    #[error("Result for task {task} cannot be recorded while {status}")]
    ResultNotAllowed { task: TaskId, status: TaskStatus },

    #[error("Result for task {0} was already recorded")]
    ResultAlreadySet(TaskId),
}

/// Processing state of a project run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunStatus {
    /// Brief accepted, pipeline not started yet
    Accepted,
    /// Waiting on the decomposition model
    Decomposing,
    /// Tasks created and handed to the engine
    Running,
    /// Every task reached a terminal state
    Completed,
    /// The intake pipeline was abandoned
    Failed { reason: String },
}

/// Bookkeeping for one submitted brief.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectRun {
    pub project_id: ProjectId,
    pub status: RunStatus,
    /// Task ids in creation order
    pub tasks: Vec<TaskId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct RegistryState {
    tasks: HashMap<TaskId, Task>,
    runs: HashMap<ProjectId, ProjectRun>,
    /// Run ids in submission order
    run_order: Vec<ProjectId>,
}

impl RegistryState {
    /// Get a run, opening it in `Accepted` state if it is new.
    fn ensure_run(&mut self, project_id: ProjectId) -> &mut ProjectRun {
        if !self.runs.contains_key(&project_id) {
            self.run_order.push(project_id);
        }
        self.runs.entry(project_id).or_insert_with(|| ProjectRun {
            project_id,
            status: RunStatus::Accepted,
            tasks: Vec::new(),
            created_at: Utc::now(),
        })
    }
}

/// In-memory registry of tasks and runs.
#[derive(Default)]
pub struct TaskRegistry {
    state: RwLock<RegistryState>,
}

impl std::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("TaskRegistry")
            .field("tasks", &state.tasks.len())
            .field("runs", &state.runs.len())
            .finish()
    }
}

impl TaskRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new run. Opening an existing run leaves it untouched.
    pub fn open_run(&self, project_id: ProjectId) -> ProjectRun {
        self.state.write().ensure_run(project_id).clone()
    }

    /// Update the processing state of a run.
    pub fn set_run_status(
        &self,
        project_id: ProjectId,
        status: RunStatus,
    ) -> Result<(), RegistryError> {
        let mut state = self.state.write();
        let run = state.runs.get_mut(&project_id).ok_or(RegistryError::UnknownRun(project_id))?;
        run.status = status;
        Ok(())
    }

    /// Get a run by id.
    pub fn run(&self, project_id: ProjectId) -> Option<ProjectRun> {
        self.state.read().runs.get(&project_id).cloned()
    }

    /// All runs in submission order.
    pub fn runs(&self) -> Vec<ProjectRun> {
        let state = self.state.read();
        state.run_order.iter().filter_map(|id| state.runs.get(id).cloned()).collect()
    }

    /// Create a queued task inside a run.
    ///
    /// The run is opened implicitly if it does not exist yet.
    pub fn create(
        &self,
        project_id: ProjectId,
        title: impl Into<String>,
        executor_kind: ExecutorKind,
        owner: impl Into<String>,
        rationale: Option<String>,
    ) -> Task {
        let task = Task::new(project_id, title, executor_kind, owner, rationale);

        let mut state = self.state.write();
        state.ensure_run(project_id).tasks.push(task.id);
        state.tasks.insert(task.id, task.clone());

        task
    }

    /// Advance a task to `next`, returning the updated task.
    ///
    /// Fails with [`RegistryError::InvalidTransition`] unless `next` directly
    /// follows the current status.
    pub fn transition(&self, id: TaskId, next: TaskStatus) -> Result<Task, RegistryError> {
        let mut state = self.state.write();
        let task = state.tasks.get_mut(&id).ok_or(RegistryError::UnknownTask(id))?;

        if !task.status.can_advance_to(next) {
            return Err(RegistryError::InvalidTransition { task: id, from: task.status, to: next });
        }

        task.status = next;
        match next {
            TaskStatus::InProgress => task.started_at = Some(Utc::now()),
            TaskStatus::Done | TaskStatus::Failed => task.finished_at = Some(Utc::now()),
            TaskStatus::Queued => {}
        }
        let updated = task.clone();
        let project_id = updated.project_id;

        if next.is_terminal() {
            Self::refresh_run_completion(&mut state, project_id);
        }

        Ok(updated)
    }

    /// Record the outcome of an in-progress task. Allowed exactly once.
    pub fn set_result(&self, id: TaskId, text: impl Into<String>) -> Result<(), RegistryError> {
        let mut state = self.state.write();
        let task = state.tasks.get_mut(&id).ok_or(RegistryError::UnknownTask(id))?;

        if task.status != TaskStatus::InProgress {
            return Err(RegistryError::ResultNotAllowed { task: id, status: task.status });
        }
        if task.result.is_some() {
            return Err(RegistryError::ResultAlreadySet(id));
        }

        task.result = Some(text.into());
        Ok(())
    }

    /// Record the result and move an in-progress task to `Done`, in one step.
    pub fn complete(&self, id: TaskId, text: impl Into<String>) -> Result<Task, RegistryError> {
        let mut state = self.state.write();
        let task = state.tasks.get_mut(&id).ok_or(RegistryError::UnknownTask(id))?;

        if !task.status.can_advance_to(TaskStatus::Done) {
            return Err(RegistryError::InvalidTransition {
                task: id,
                from: task.status,
                to: TaskStatus::Done,
            });
        }
        if task.result.is_some() {
            return Err(RegistryError::ResultAlreadySet(id));
        }

        task.result = Some(text.into());
        task.status = TaskStatus::Done;
        task.finished_at = Some(Utc::now());
        let updated = task.clone();

        Self::refresh_run_completion(&mut state, updated.project_id);
        Ok(updated)
    }

    /// Move an in-progress task to `Failed` and record why, in one step.
    pub fn fail(&self, id: TaskId, message: impl Into<String>) -> Result<Task, RegistryError> {
        let mut state = self.state.write();
        let task = state.tasks.get_mut(&id).ok_or(RegistryError::UnknownTask(id))?;

        if !task.status.can_advance_to(TaskStatus::Failed) {
            return Err(RegistryError::InvalidTransition {
                task: id,
                from: task.status,
                to: TaskStatus::Failed,
            });
        }

        task.status = TaskStatus::Failed;
        task.error = Some(message.into());
        task.finished_at = Some(Utc::now());
        let updated = task.clone();

        Self::refresh_run_completion(&mut state, updated.project_id);
        Ok(updated)
    }

    /// Get a task by id.
    pub fn get(&self, id: TaskId) -> Option<Task> {
        self.state.read().tasks.get(&id).cloned()
    }

    /// Tasks of one run in creation order.
    pub fn project_tasks(&self, project_id: ProjectId) -> Vec<Task> {
        let state = self.state.read();
        state
            .runs
            .get(&project_id)
            .map(|run| run.tasks.iter().filter_map(|id| state.tasks.get(id).cloned()).collect())
            .unwrap_or_default()
    }

    /// Every task, grouped by run in submission order.
    pub fn list(&self) -> Vec<Task> {
        let state = self.state.read();
        state
            .run_order
            .iter()
            .filter_map(|project_id| state.runs.get(project_id))
            .flat_map(|run| run.tasks.iter().filter_map(|id| state.tasks.get(id).cloned()))
            .collect()
    }

    /// Get total number of tasks.
    pub fn len(&self) -> usize {
        self.state.read().tasks.len()
    }

    /// Check if registry holds no tasks.
    pub fn is_empty(&self) -> bool {
        self.state.read().tasks.is_empty()
    }

    fn refresh_run_completion(state: &mut RegistryState, project_id: ProjectId) {
        let all_terminal = match state.runs.get(&project_id) {
            Some(run) => run
                .tasks
                .iter()
                .all(|id| state.tasks.get(id).is_some_and(|t| t.status.is_terminal())),
            None => return,
        };

        if let Some(run) = state.runs.get_mut(&project_id) {
            if all_terminal && run.status == RunStatus::Running {
                run.status = RunStatus::Completed;
            }
        }
    }
}
