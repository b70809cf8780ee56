use std::sync::Arc;

use super::{HashingEmbeddingProvider, HttpClient, OpenAiEmbeddingProvider};
use crate::config::{EmbeddingBackend, EmbeddingConfig};
use crate::domain::{DomainError, EmbeddingProvider};

/// Factory for creating embedding providers
#[derive(Debug)]
pub struct EmbeddingProviderFactory;

impl EmbeddingProviderFactory {
    /// The local backend ignores `model`; its identifier encodes the dimension count
    pub fn from_config(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>, DomainError> {
        if config.dimensions == 0 {
            return Err(DomainError::configuration("embedding.dimensions must be positive"));
        }

        match config.provider {
            EmbeddingBackend::Local => Ok(Arc::new(HashingEmbeddingProvider::new(config.dimensions))),
            EmbeddingBackend::OpenAi => {
                let api_key = std::env::var(&config.api_key_env).map_err(|_| {
                    DomainError::configuration(format!(
                        "Embedding API key variable '{}' is not set",
                        config.api_key_env
                    ))
                })?;

                Ok(Arc::new(OpenAiEmbeddingProvider::new(
                    HttpClient::new(),
                    api_key,
                    &config.base_url,
                    &config.model,
                    config.dimensions,
                )))
            }
        }
    }
}
