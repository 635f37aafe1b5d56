//! # AgentFlow
//!
//! Turns a free-text project brief into tracked tasks and runs them.
//!
//! A language model splits the brief into small independent work items. Each
//! item goes either to automation or to a person from the roster. Automated
//! items are completed by the model with context retrieved from a per-project
//! index, and every state change is pushed live to websocket subscribers.
//!
//! ## Features
//!
//! - **Decomposition**: strict validation of model output before any task exists
//! - **Single-consumer engine**: FIFO execution with ordered per-task updates
//! - **Live feed**: JSON task snapshots over `/ws/tasks`
//! - **Per-project retrieval**: local or remote embeddings, persisted indexes
//!
//! ## Quick Start
//!
//! ```bash
//! export AGENTFLOW_LLM_URL=http://localhost:8080/v1
//! agentflow serve
//!
//! curl -F "file=@brief.md;type=text/markdown" http://127.0.0.1:8000/projects
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow common patterns that are intentional in this codebase
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::future_not_send)]

pub mod ai;
pub mod api;
pub mod app;
pub mod core;
pub mod hub;
pub mod index;
pub mod workflow;

pub use ai::{AIError, CompletionRequest, CompletionService, EmbeddingService};
pub use app::{App, Services};
pub use crate::core::{Config, ExecutorKind, ProjectId, Task, TaskId, TaskRegistry, TaskStatus};
pub use hub::NotificationHub;
pub use index::{ContextRetriever, IndexStore};
pub use workflow::{Decomposer, Engine, IntakePipeline};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "agentflow";
