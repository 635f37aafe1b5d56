//! Task data structures.
//!
//! A `Task` is one atomic work item produced from a project brief. Its
//! identity, title, executor and owner are fixed at creation; only the
//! execution engine advances its status and records its outcome.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a single task.
pub type TaskId = Uuid;

/// Identifier of a project run (one submitted brief).
pub type ProjectId = Uuid;

/// Who completes a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutorKind {
    /// Completed by the language model
    #[serde(rename = "ai")]
    Automated,
    /// Completed by a person from the roster
    #[serde(rename = "human")]
    Human,
}

impl ExecutorKind {
    /// Parse an executor label produced by the decomposition model.
    ///
    /// Comparison is case-insensitive; `ai` and `automated` both map to
    /// [`ExecutorKind::Automated`].
    pub fn parse(label: &str) -> Option<Self> {
        match label.to_lowercase().as_str() {
            "ai" | "automated" => Some(Self::Automated),
            "human" => Some(Self::Human),
            _ => None,
        }
    }

    /// Wire name used in snapshots and raw artifacts.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Automated => "ai",
            Self::Human => "human",
        }
    }
}

impl fmt::Display for ExecutorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a task.
///
/// The only legal paths are `Queued -> InProgress -> Done` and
/// `Queued -> InProgress -> Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    InProgress,
    Done,
    Failed,
}

impl TaskStatus {
    /// Check whether moving from `self` to `next` follows the lifecycle order.
    pub fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::InProgress)
                | (Self::InProgress, Self::Done)
                | (Self::InProgress, Self::Failed)
        )
    }

    /// Check if the task has reached a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tracked unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier, assigned at creation
    pub id: TaskId,

    /// Run this task belongs to
    pub project_id: ProjectId,

    /// Short human-readable description of the work
    pub title: String,

    /// Whether automation or a human completes the task
    pub executor_kind: ExecutorKind,

    /// Automation identity or chosen roster member
    pub owner: String,

    /// Current lifecycle state
    pub status: TaskStatus,

    /// Outcome text, set once when the task finishes
    pub result: Option<String>,

    /// Justification captured from decomposition
    pub rationale: Option<String>,

    /// Failure message when the task ended in `Failed`
    pub error: Option<String>,

    /// When the task was created
    pub created_at: DateTime<Utc>,

    /// When execution started
    pub started_at: Option<DateTime<Utc>>,

    /// When the task reached a terminal state
    pub finished_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a new queued task.
    pub fn new(
        project_id: ProjectId,
        title: impl Into<String>,
        executor_kind: ExecutorKind,
        owner: impl Into<String>,
        rationale: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            title: title.into(),
            executor_kind,
            owner: owner.into(),
            status: TaskStatus::Queued,
            result: None,
            rationale,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Build the wire snapshot pushed to subscribers.
    pub fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot::from(self)
    }
}

/// Task state as seen by subscribers of the live task feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub project_id: ProjectId,
    pub title: String,
    pub status: TaskStatus,
    pub routed_to: ExecutorKind,
    pub owner: Option<String>,
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&Task> for TaskSnapshot {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id,
            project_id: task.project_id,
            title: task.title.clone(),
            status: task.status,
            routed_to: task.executor_kind,
            owner: Some(task.owner.clone()),
            result: task.result.clone(),
            error: task.error.clone(),
        }
    }
}
