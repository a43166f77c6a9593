/// Configuration management for AgentFlow
///
/// Handles server binding, workflow storage backend selection and the
/// completion-provider settings used by LLM nodes.

use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Workflow storage configuration
    pub storage: StorageConfig,
    /// Completion provider configuration
    pub llm: LlmConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Server port number
    pub port: u16,
}

/// Which workflow store backs the CRUD API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// In-process map, gone when the process exits
    Memory,
    /// SQLite database at `database_url`
    Sqlite,
}

/// Workflow storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// SQLite connection URL, only read by the sqlite backend
    pub database_url: String,
}

/// Completion provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Anthropic API key; when absent LLM nodes return a placeholder text
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Messages endpoint
    pub api_url: String,
    /// Model alias used when a node does not pick one
    pub default_model: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: "https://api.anthropic.com/v1/messages".to_string(),
            default_model: "claude-4-sonnet".to_string(),
            max_tokens: 1024,
            temperature: 0.7,
        }
    }
}

impl Default for Config {
    /// Default configuration with ENV_VAR support for container deployment
    fn default() -> Self {
        let llm_defaults = LlmConfig::default();

        Self {
            server: ServerConfig {
                host: std::env::var("AGENTFLOW_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: std::env::var("AGENTFLOW_PORT")
                    .unwrap_or_else(|_| "8000".to_string())
                    .parse()
                    .unwrap_or(8000),
            },
            storage: StorageConfig {
                backend: match std::env::var("AGENTFLOW_STORAGE").as_deref() {
                    Ok("sqlite") => StorageBackend::Sqlite,
                    _ => StorageBackend::Memory,
                },
                database_url: std::env::var("AGENTFLOW_DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite://agentflow.db".to_string()),
            },
            llm: LlmConfig {
                api_key: std::env::var("ANTHROPIC_API_KEY")
                    .ok()
                    .filter(|key| !key.trim().is_empty()),
                api_url: std::env::var("ANTHROPIC_API_URL").unwrap_or_else(|_| llm_defaults.api_url.clone()),
                default_model: std::env::var("AGENTFLOW_DEFAULT_MODEL")
                    .unwrap_or_else(|_| llm_defaults.default_model.clone()),
                ..llm_defaults
            },
        }
    }
}
