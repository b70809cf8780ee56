//! Layered application configuration

mod app_config;

pub use app_config::{
    AgentConfig, AppConfig, DatabaseConfig, EmbeddingBackend, EmbeddingConfig, IndexConfig,
    LlmConfig, LogFormat, LoggingConfig, ServerConfig,
};
