//! Task lifecycle workflow.
//!
//! A brief flows through these stages:
//!
//! - [`Decomposer`] - splits the brief into validated work items
//! - [`Assigner`] - picks an owner for each item
//! - [`IntakePipeline`] - creates the tasks, indexes the run and queues the work
//! - [`Engine`] - the single consumer that executes queued tasks in order

mod assign;
mod decompose;
mod engine;
mod intake;

pub use assign::{Assigner, FALLBACK_HUMAN};
pub use decompose::{
    build_prompt, parse_reply, sanitize_field, strip_fences, DecomposedItem, Decomposer,
    Decomposition, DecompositionError,
};
pub use engine::{human_result, task_prompt, Engine, EngineError, EngineSettings};
pub use intake::{IntakeError, IntakePipeline};
