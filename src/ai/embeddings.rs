//! Remote embedding endpoints.
//!
//! Two wire formats are supported:
//! - OpenAI-compatible: `POST {base}/embeddings` returning `data[].embedding`
//! - RunPod serverless: `POST {base}/run` returning `output` or a bare list

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{AIError, EmbeddingService};
use crate::core::EmbeddingsConfig;

/// Wire format of a remote embedding endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingFlavor {
    OpenAI,
    RunPod,
}

/// Embedding client for a remote HTTP endpoint.
pub struct RemoteEmbedder {
    client: Client,
    flavor: EmbeddingFlavor,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl RemoteEmbedder {
    /// Create an embedder for `base_url`.
    pub fn new(flavor: EmbeddingFlavor, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            flavor,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            model: model.into(),
        }
    }

    /// Build an embedder from the `[embeddings]` config section.
    pub fn from_config(flavor: EmbeddingFlavor, config: &EmbeddingsConfig) -> Result<Self, AIError> {
        let base_url = config
            .base_url
            .clone()
            .ok_or_else(|| AIError::NotConfigured("embeddings.base_url is not set".to_string()))?;

        let client = Client::builder().timeout(Duration::from_secs(config.timeout_secs)).build()?;

        Ok(Self {
            client,
            flavor,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    fn endpoint(&self) -> String {
        match self.flavor {
            EmbeddingFlavor::OpenAI => format!("{}/embeddings", self.base_url),
            EmbeddingFlavor::RunPod => format!("{}/run", self.base_url),
        }
    }
}

#[async_trait]
impl EmbeddingService for RemoteEmbedder {
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, AIError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let body = EmbeddingRequest { model: &self.model, input: inputs };
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

        let payload: Value =
            response.json().await.map_err(|e| AIError::MalformedResponse(e.to_string()))?;

        let vectors = match self.flavor {
            EmbeddingFlavor::OpenAI => parse_openai(payload)?,
            EmbeddingFlavor::RunPod => parse_runpod(payload)?,
        };

        if vectors.is_empty() {
            tracing::error!(inputs = inputs.len(), "Embedding service returned no vectors");
            return Err(AIError::EmptyEmbeddings);
        }
        Ok(vectors)
    }

    fn name(&self) -> &str {
        match self.flavor {
            EmbeddingFlavor::OpenAI => "openai-embeddings",
            EmbeddingFlavor::RunPod => "runpod-embeddings",
        }
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct OpenAIEmbeddingResponse {
    data: Vec<OpenAIEmbedding>,
}

#[derive(Debug, Deserialize)]
struct OpenAIEmbedding {
    embedding: Vec<f32>,
}

fn parse_openai(payload: Value) -> Result<Vec<Vec<f32>>, AIError> {
    let response: OpenAIEmbeddingResponse =
        serde_json::from_value(payload).map_err(|e| AIError::MalformedResponse(e.to_string()))?;
    Ok(response.data.into_iter().map(|d| d.embedding).collect())
}

fn parse_runpod(payload: Value) -> Result<Vec<Vec<f32>>, AIError> {
    let vectors = match payload {
        Value::Object(mut map) => map.remove("output").unwrap_or(Value::Object(map)),
        other => other,
    };

    serde_json::from_value(vectors)
        .map_err(|e| AIError::MalformedResponse(format!("unexpected embedding response: {e}")))
}
