//! Configuration management for AgentFlow.
//!
//! Handles loading configuration from TOML files and environment overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Chat completion service
    pub llm: LlmConfig,

    /// Embedding service used by the project index
    pub embeddings: EmbeddingsConfig,

    /// Execution engine behaviour
    pub engine: EngineConfig,

    /// People that human tasks are assigned to
    pub roster: RosterConfig,

    /// Where artifacts and indexes are written
    pub storage: StorageConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// Allow cross-origin requests from any origin
    pub cors_permissive: bool,
}

/// Chat completion service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// OpenAI-compatible base URL (e.g. `https://host/openai/v1`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Bearer token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model name sent with every request
    pub model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Sampling temperature for brief decomposition
    pub decompose_temperature: f32,

    /// Token budget for brief decomposition
    pub decompose_max_tokens: u32,

    /// Sampling temperature for automated tasks
    pub task_temperature: f32,

    /// Token budget for automated tasks
    pub task_max_tokens: u32,
}

/// Which embedding backend feeds the project index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Offline feature-hashing embedder
    #[default]
    Local,
    /// OpenAI-compatible `/embeddings` endpoint
    OpenAI,
    /// RunPod serverless `/run` endpoint
    RunPod,
}

/// Embedding service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingsConfig {
    pub provider: EmbeddingProvider,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    pub model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Execution engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Simulated latency of a human task, in milliseconds
    pub human_delay_ms: u64,

    /// Number of index snippets prepended to automated task prompts
    pub retrieval_k: usize,

    /// Stop the engine after the first failed task instead of moving on
    pub halt_on_error: bool,

    /// Owner recorded on automated tasks
    pub automation_owner: String,
}

/// Human roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RosterConfig {
    pub humans: Vec<String>,
}

/// Storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for raw decompositions and project indexes
    pub data_dir: PathBuf,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Looks for config in:
    /// 1. `.agentflow.toml` in current directory
    /// 2. `~/.config/agentflow/config.toml`
    /// 3. Falls back to defaults
    ///
    /// Environment overrides are applied on top in every case.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = match Self::discover() {
            Some(path) => Self::load_from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from an explicit file, then apply environment overrides.
    pub fn load_with_overrides(path: &Path) -> anyhow::Result<Self> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Locate the config file that [`Config::load`] would read.
    pub fn discover() -> Option<PathBuf> {
        let local_config = PathBuf::from(".agentflow.toml");
        if local_config.exists() {
            return Some(local_config);
        }

        Self::config_dir().map(|dir| dir.join("config.toml")).filter(|path| path.exists())
    }

    /// Get the config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("agentflow"))
    }

    /// Apply `AGENTFLOW_*` environment variables.
    pub fn apply_env_overrides(&mut self) {
        if let Some(url) = env_var("AGENTFLOW_LLM_URL") {
            self.llm.base_url = Some(url);
        }
        if let Some(key) = env_var("AGENTFLOW_LLM_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(model) = env_var("AGENTFLOW_MODEL") {
            self.llm.model = model;
        }
        if let Some(provider) = env_var("AGENTFLOW_EMBED_PROVIDER") {
            match provider.to_lowercase().as_str() {
                "local" => self.embeddings.provider = EmbeddingProvider::Local,
                "openai" => self.embeddings.provider = EmbeddingProvider::OpenAI,
                "runpod" => self.embeddings.provider = EmbeddingProvider::RunPod,
                other => tracing::warn!(provider = other, "Ignoring unknown embedding provider"),
            }
        }
        if let Some(url) = env_var("AGENTFLOW_EMBED_URL") {
            self.embeddings.base_url = Some(url);
        }
        if let Some(key) = env_var("AGENTFLOW_EMBED_KEY") {
            self.embeddings.api_key = Some(key);
        }
        if let Some(model) = env_var("AGENTFLOW_EMBED_MODEL") {
            self.embeddings.model = model;
        }
        if let Some(dir) = env_var("AGENTFLOW_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(port) = env_var("AGENTFLOW_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!(value = %port, "Ignoring invalid AGENTFLOW_PORT"),
            }
        }
    }

    /// Render the configuration as TOML.
    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

impl EngineConfig {
    /// Simulated human latency as a duration.
    pub fn human_delay(&self) -> Duration {
        Duration::from_millis(self.human_delay_ms)
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_string(), port: 8000, cors_permissive: true }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            model: "meta-llama/Meta-Llama-3-8B-Instruct".to_string(),
            timeout_secs: 900,
            decompose_temperature: 0.1,
            decompose_max_tokens: 512,
            task_temperature: 0.2,
            task_max_tokens: 400,
        }
    }
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Local,
            base_url: None,
            api_key: None,
            model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            timeout_secs: 90,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            human_delay_ms: 20_000,
            retrieval_k: 4,
            halt_on_error: false,
            automation_owner: "LLM-Llama-3".to_string(),
        }
    }
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            humans: vec!["Jane Doe".to_string(), "Carlos R.".to_string(), "Priya N.".to_string()],
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { data_dir: PathBuf::from("data/projects") }
    }
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    const ENV_VARS: [&str; 4] =
        ["AGENTFLOW_LLM_URL", "AGENTFLOW_MODEL", "AGENTFLOW_PORT", "AGENTFLOW_EMBED_PROVIDER"];

    fn clear_env() {
        for name in ENV_VARS {
            std::env::remove_var(name);
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.engine.retrieval_k, 4);
        assert_eq!(config.engine.human_delay(), Duration::from_secs(20));
        assert_eq!(config.llm.timeout_secs, 900);
        assert_eq!(config.embeddings.timeout_secs, 90);
        assert_eq!(config.roster.humans.len(), 3);
        assert!(!config.engine.halt_on_error);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = config.to_toml().unwrap();
        assert!(toml_str.contains("[server]"));
        assert!(toml_str.contains("[engine]"));
        assert!(!toml_str.contains("api_key"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [llm]
            base_url = "http://localhost:8080/v1"
            model = "qwen"

            [engine]
            human_delay_ms = 5
            halt_on_error = true

            [embeddings]
            provider = "runpod"

            [roster]
            humans = ["Ada"]
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.llm.base_url.as_deref(), Some("http://localhost:8080/v1"));
        assert_eq!(config.llm.model, "qwen");
        assert_eq!(config.llm.task_max_tokens, 400);
        assert_eq!(config.engine.human_delay_ms, 5);
        assert!(config.engine.halt_on_error);
        assert_eq!(config.embeddings.provider, EmbeddingProvider::RunPod);
        assert_eq!(config.roster.humans, vec!["Ada"]);
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    #[serial(agentflow_env)]
    fn test_env_overrides() {
        clear_env();
        std::env::set_var("AGENTFLOW_LLM_URL", "http://runpod/openai/v1");
        std::env::set_var("AGENTFLOW_MODEL", "mistral");
        std::env::set_var("AGENTFLOW_PORT", "9001");
        std::env::set_var("AGENTFLOW_EMBED_PROVIDER", "OpenAI");

        let mut config = Config::default();
        config.apply_env_overrides();
        clear_env();

        assert_eq!(config.llm.base_url.as_deref(), Some("http://runpod/openai/v1"));
        assert_eq!(config.llm.model, "mistral");
        assert_eq!(config.server.port, 9001);
        assert_eq!(config.embeddings.provider, EmbeddingProvider::OpenAI);
    }

    #[test]
    #[serial(agentflow_env)]
    fn test_invalid_port_is_ignored() {
        clear_env();
        std::env::set_var("AGENTFLOW_PORT", "not-a-port");

        let mut config = Config::default();
        config.apply_env_overrides();
        clear_env();

        assert_eq!(config.server.port, 8000);
    }
}
