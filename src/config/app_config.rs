use std::time::Duration;

use serde::Deserialize;

use crate::domain::workflow::{AgentSettings, ExploreMode};

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub agent: AgentConfig,
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub database: DatabaseConfig,
    pub index: IndexConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Knobs of the workflow itself
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub max_attempts: u32,
    pub row_cap: u64,
    pub schema_top_k: usize,
    pub example_top_m: usize,
    pub explore: ExploreMode,
    pub max_explore_probes: usize,
    pub step_timeout_ms: u64,
    pub chart_max_rows: usize,
    pub answer_preview_rows: usize,
}

/// OpenAI-compatible chat endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Feature hashing, no network
    #[default]
    Local,
    OpenAi,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingBackend,
    pub model: String,
    pub dimensions: usize,
    pub base_url: String,
    pub api_key_env: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub query_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub path: String,
    pub examples_path: String,
    pub build_on_startup: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        let settings = AgentSettings::default();
        Self {
            max_attempts: settings.max_attempts,
            row_cap: settings.row_cap,
            schema_top_k: settings.schema_top_k,
            example_top_m: settings.example_top_m,
            explore: settings.explore,
            max_explore_probes: settings.max_explore_probes,
            step_timeout_ms: settings.step_timeout.as_millis() as u64,
            chart_max_rows: settings.chart_max_rows,
            answer_preview_rows: settings.answer_preview_rows,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.0,
            timeout_ms: 60_000,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingBackend::Local,
            model: "hashing-v1".to_string(),
            dimensions: 256,
            base_url: "https://api.openai.com".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://data/chinook.db".to_string(),
            max_connections: 4,
            query_timeout_ms: 10_000,
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: "data/index.json".to_string(),
            examples_path: "config/examples.json".to_string(),
            build_on_startup: true,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Resolve the run settings handed to the orchestrator
    pub fn agent_settings(&self) -> AgentSettings {
        AgentSettings {
            model: self.llm.model.clone(),
            temperature: self.llm.temperature,
            max_attempts: self.agent.max_attempts,
            row_cap: self.agent.row_cap,
            schema_top_k: self.agent.schema_top_k,
            example_top_m: self.agent.example_top_m,
            explore: self.agent.explore,
            max_explore_probes: self.agent.max_explore_probes,
            step_timeout: Duration::from_millis(self.agent.step_timeout_ms),
            chart_max_rows: self.agent.chart_max_rows,
            answer_preview_rows: self.agent.answer_preview_rows,
        }
    }
}
