//! OpenAI-compatible chat completions.
//!
//! Works against any endpoint exposing `POST {base_url}/chat/completions`
//! (OpenAI, RunPod's OpenAI shim, vLLM, ...).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{AIError, ChatMessage, CompletionRequest, CompletionService};
use crate::core::LlmConfig;

/// Chat completion client for OpenAI-compatible APIs.
pub struct OpenAICompatProvider {
    client: Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl OpenAICompatProvider {
    /// Create a provider for `base_url` using `model`.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: None,
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Build a provider from the `[llm]` config section.
    pub fn from_config(config: &LlmConfig) -> Result<Self, AIError> {
        let base_url = config
            .base_url
            .clone()
            .ok_or_else(|| AIError::NotConfigured("llm.base_url is not set".to_string()))?;

        let client = Client::builder().timeout(Duration::from_secs(config.timeout_secs)).build()?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Model used for every request.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl CompletionService for OpenAICompatProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<String, AIError> {
        let body = ChatRequest {
            model: self.model.clone(),
            messages: request.messages,
            max_tokens: Some(request.max_tokens),
            temperature: Some(request.temperature),
        };

        let mut builder = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AIError::ApiError { status, body });
        }

        let response: ChatResponse =
            response.json().await.map_err(|e| AIError::MalformedResponse(e.to_string()))?;

        response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .ok_or(AIError::NoResponse)
    }

    fn name(&self) -> &str {
        "openai-compatible"
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_trims_base_url() {
        let provider = OpenAICompatProvider::new("http://localhost:8000/openai/v1/", "llama");
        assert_eq!(provider.endpoint(), "http://localhost:8000/openai/v1/chat/completions");
        assert_eq!(provider.model(), "llama");
    }

    #[test]
    fn test_from_config_requires_base_url() {
        let config = LlmConfig { base_url: None, ..LlmConfig::default() };
        assert!(matches!(
            OpenAICompatProvider::from_config(&config),
            Err(AIError::NotConfigured(_))
        ));
    }

    #[test]
    fn test_request_serialization() {
        let body = ChatRequest {
            model: "m".to_string(),
            messages: vec![ChatMessage::user("hi")],
            max_tokens: Some(512),
            temperature: Some(0.1),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "m");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["max_tokens"], 512);
    }

    #[test]
    fn test_response_parsing() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"  done \n"}}]}"#;
        let response: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.choices[0].message.content.trim(), "done");
    }
}
