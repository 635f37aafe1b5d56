//! Brief decomposition.
//!
//! Asks the completion service to split a brief into small independent work
//! items, then validates the reply before anything reaches the registry.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::ai::{AIError, CompletionRequest, CompletionService};
use crate::core::{ExecutorKind, ProjectId};

static FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").expect("valid fence pattern"));

const EXECUTOR_KEYS: [&str; 3] = ["routed_to", "executor_kind", "routedTo"];
const RATIONALE_KEYS: [&str; 2] = ["why", "rationale"];
const LIST_KEYS: [&str; 2] = ["tasks", "items"];

/// A validated work item produced from a brief.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecomposedItem {
    pub title: String,
    pub executor_kind: ExecutorKind,
    pub rationale: Option<String>,
}

/// Result of a successful decomposition.
#[derive(Debug, Clone)]
pub struct Decomposition {
    /// The parsed item list exactly as the model produced it, before filtering
    pub raw: Value,
    /// Items that passed validation, in reply order
    pub items: Vec<DecomposedItem>,
}

/// Decomposition error types.
#[derive(Debug, thiserror::Error)]
pub enum DecompositionError {
    #[error("Completion call failed: {0}")]
    Completion(#[from] AIError),

    #[error("Reply is not valid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
        reply: String,
    },

    #[error("Reply has no recognizable task list")]
    UnrecognizedShape,

    #[error("No valid tasks found in reply")]
    NoValidItems,
}

/// How a parsed reply carries its items.
#[derive(Debug, PartialEq)]
enum ReplyShape {
    /// A bare JSON array
    Array(Vec<Value>),
    /// An object holding the list under `tasks` or `items`
    Wrapped(Vec<Value>),
    /// One object describing a single item
    Single(Map<String, Value>),
    Invalid,
}

impl ReplyShape {
    fn classify(value: Value) -> Self {
        match value {
            Value::Array(items) => Self::Array(items),
            Value::Object(mut map) => {
                for key in LIST_KEYS {
                    if matches!(map.get(key), Some(Value::Array(_))) {
                        if let Some(Value::Array(items)) = map.remove(key) {
                            return Self::Wrapped(items);
                        }
                    }
                }
                if map.contains_key("title") {
                    Self::Single(map)
                } else {
                    Self::Invalid
                }
            }
            _ => Self::Invalid,
        }
    }

    fn into_items(self) -> Option<Vec<Value>> {
        match self {
            Self::Array(items) | Self::Wrapped(items) => Some(items),
            Self::Single(map) => Some(vec![Value::Object(map)]),
            Self::Invalid => None,
        }
    }
}

/// Turns briefs into validated work items through the completion service.
#[derive(Clone)]
pub struct Decomposer {
    completion: Arc<dyn CompletionService>,
    temperature: f32,
    max_tokens: u32,
}

impl std::fmt::Debug for Decomposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decomposer")
            .field("completion", &self.completion.name())
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl Decomposer {
    pub fn new(completion: Arc<dyn CompletionService>, temperature: f32, max_tokens: u32) -> Self {
        Self { completion, temperature, max_tokens }
    }

    /// Decompose a brief into work items.
    ///
    /// Makes exactly one completion call. Fails when the reply is not JSON,
    /// has no recognizable list, or no entry survives validation.
    pub async fn decompose(
        &self,
        project_id: ProjectId,
        brief: &str,
    ) -> Result<Decomposition, DecompositionError> {
        let request =
            CompletionRequest::prompt(build_prompt(brief), self.temperature, self.max_tokens);
        let reply = self.completion.complete(request).await?;
        debug!(%project_id, reply = %reply, "Decomposition reply");

        let decomposition = parse_reply(&reply)?;
        info!(%project_id, items = decomposition.items.len(), "Brief decomposed");
        Ok(decomposition)
    }
}

/// Build the decomposition prompt around a brief.
pub fn build_prompt(brief: &str) -> String {
    format!(
        r#"You are the delivery lead of a team mixing automation and people.
Split the project brief below into the smallest independent tasks that can run in parallel.

Reply with ONLY a JSON array of objects in exactly this shape:

[{{"title": "Draft architecture diagram", "routed_to": "ai", "why": "Diagram tools handle this quickly"}},
 {{"title": "Review architecture with security team", "routed_to": "human", "why": "Needs governance sign-off"}}]

Rules:
1. "routed_to" is "ai" when automation can finish the task, "human" when it needs human expertise or approval.
2. "why" is a short justification of 5 to 15 words.
3. No wrapper object, no markdown, no prose.

Project brief (do not repeat it):
"""{brief}""""#
    )
}

/// Remove a fenced code block wrapper, if any, and trim.
pub fn strip_fences(text: &str) -> &str {
    match FENCE_RE.captures(text).and_then(|caps| caps.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => text.trim(),
    }
}

/// Trim surrounding spaces and quote characters from an extracted field.
pub fn sanitize_field(value: &Value) -> String {
    let text = match value {
        Value::Null => return String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    text.trim_matches(|c: char| c == ' ' || c == '"' || c == '\'').to_string()
}

/// Parse and validate a decomposition reply.
pub fn parse_reply(reply: &str) -> Result<Decomposition, DecompositionError> {
    let payload = strip_fences(reply);
    let value: Value = serde_json::from_str(payload).map_err(|source| {
        DecompositionError::InvalidJson { source, reply: payload.to_string() }
    })?;

    let entries = ReplyShape::classify(value)
        .into_items()
        .ok_or(DecompositionError::UnrecognizedShape)?;
    let items: Vec<DecomposedItem> = entries.iter().filter_map(validate_entry).collect();

    if items.is_empty() {
        return Err(DecompositionError::NoValidItems);
    }

    Ok(Decomposition { raw: Value::Array(entries), items })
}

fn first_field<'a>(entry: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| entry.get(*key))
}

fn validate_entry(entry: &Value) -> Option<DecomposedItem> {
    let Some(map) = entry.as_object() else {
        warn!(entry = %entry, "Skipping non-object entry");
        return None;
    };

    let title = map.get("title").map(sanitize_field).unwrap_or_default();
    let routed =
        first_field(map, &EXECUTOR_KEYS).map(sanitize_field).unwrap_or_default().to_lowercase();
    let rationale =
        first_field(map, &RATIONALE_KEYS).map(sanitize_field).filter(|r| !r.is_empty());

    let executor_kind = ExecutorKind::parse(&routed);
    match executor_kind {
        Some(executor_kind) if !title.is_empty() => {
            Some(DecomposedItem { title, executor_kind, rationale })
        }
        _ => {
            warn!(entry = %entry, "Skipping malformed item");
            None
        }
    }
}
