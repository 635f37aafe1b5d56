//! Language-model collaborators.
//!
//! The completion and embedding services are reached through the
//! [`CompletionService`] and [`EmbeddingService`] traits. Concrete clients are
//! built once at startup and handed to the components that need them, so tests
//! can swap in scripted fakes.

mod embeddings;
mod local;
mod openai;

pub use embeddings::{EmbeddingFlavor, RemoteEmbedder};
pub use local::LocalEmbedder;
pub use openai::OpenAICompatProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A chat message sent to the completion service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}

/// One completion call. The model is chosen by the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CompletionRequest {
    /// Build a request holding a single user prompt.
    pub fn prompt(content: impl Into<String>, temperature: f32, max_tokens: u32) -> Self {
        Self { messages: vec![ChatMessage::user(content)], temperature, max_tokens }
    }
}

/// Text completion capability.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Send the request and return the reply content.
    async fn complete(&self, request: CompletionRequest) -> Result<String, AIError>;

    /// Get the provider name.
    fn name(&self) -> &str;
}

/// Text embedding capability.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Embed every input, returning one vector per input in order.
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, AIError>;

    /// Get the provider name.
    fn name(&self) -> &str;
}

/// AI error types.
#[derive(Debug, thiserror::Error)]
pub enum AIError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {body}")]
    ApiError { status: u16, body: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("No response from AI")]
    NoResponse,

    #[error("Embedding service returned no vectors")]
    EmptyEmbeddings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_request() {
        let request = CompletionRequest::prompt("hello", 0.2, 400);
        assert_eq!(request.messages, vec![ChatMessage::user("hello")]);
        assert_eq!(request.max_tokens, 400);
    }

    #[test]
    fn test_error_display() {
        let err = AIError::ApiError { status: 503, body: "overloaded".to_string() };
        assert_eq!(err.to_string(), "API error (503): overloaded");
    }
}
