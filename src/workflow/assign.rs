//! Executor assignment for decomposed items.

use rand::seq::SliceRandom;

use super::decompose::DecomposedItem;
use crate::core::{EngineConfig, ExecutorKind, RosterConfig};

/// Owner used when a human task meets an empty roster.
pub const FALLBACK_HUMAN: &str = "Human";

/// Maps a decomposed item to a concrete owner.
#[derive(Debug, Clone)]
pub struct Assigner {
    automation_owner: String,
    roster: Vec<String>,
}

impl Assigner {
    pub fn new(automation_owner: impl Into<String>, roster: Vec<String>) -> Self {
        Self { automation_owner: automation_owner.into(), roster }
    }

    pub fn from_config(engine: &EngineConfig, roster: &RosterConfig) -> Self {
        Self::new(engine.automation_owner.clone(), roster.humans.clone())
    }

    /// Pick the executor and owner for an item.
    ///
    /// Automated items always go to the automation identity; human items go to
    /// a roster member chosen uniformly at random.
    pub fn assign(&self, item: &DecomposedItem) -> (ExecutorKind, String) {
        let owner = match item.executor_kind {
            ExecutorKind::Automated => self.automation_owner.clone(),
            ExecutorKind::Human => self
                .roster
                .choose(&mut rand::thread_rng())
                .cloned()
                .unwrap_or_else(|| FALLBACK_HUMAN.to_string()),
        };
        (item.executor_kind, owner)
    }
}
