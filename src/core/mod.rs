//! Core types and functionality for AgentFlow.
//!
//! This module contains the fundamental data structures used throughout
//! the application: tasks, the registry, configuration, and artifact storage.

mod artifacts;
mod config;
mod registry;
mod task;

pub use artifacts::{ArtifactError, ArtifactStore};
pub use config::{
    Config, EmbeddingProvider, EmbeddingsConfig, EngineConfig, LlmConfig, RosterConfig,
    ServerConfig, StorageConfig,
};
pub use registry::{ProjectRun, RegistryError, RunStatus, TaskRegistry};
pub use task::{ExecutorKind, ProjectId, Task, TaskId, TaskSnapshot, TaskStatus};
