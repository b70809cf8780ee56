use std::sync::Arc;
use std::time::Duration;

use super::http_client::HttpClient;
use super::OpenAiProvider;
use crate::config::LlmConfig;
use crate::domain::{DomainError, LlmProvider};

/// Factory for creating LLM providers
#[derive(Debug)]
pub struct LlmProviderFactory;

impl LlmProviderFactory {
    /// Build the configured provider; the API key is read from `api_key_env`.
    /// A missing key is allowed so local OpenAI-compatible servers work without one.
    pub fn from_config(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, DomainError> {
        let api_key = std::env::var(&config.api_key_env).unwrap_or_default();
        if api_key.is_empty() {
            tracing::warn!(env = %config.api_key_env, "No LLM API key set");
        }

        let client = HttpClient::with_timeout(Duration::from_millis(config.timeout_ms))?;
        Ok(Arc::new(OpenAiProvider::with_base_url(
            client,
            api_key,
            &config.base_url,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config() {
        let config = LlmConfig {
            api_key_env: "PMP_SQL_AGENT_TEST_UNSET_KEY".to_string(),
            ..LlmConfig::default()
        };

        let provider = LlmProviderFactory::from_config(&config).unwrap();
        assert_eq!(provider.provider_name(), "openai");
    }
}
