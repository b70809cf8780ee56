//! Embedding provider trait definition

use async_trait::async_trait;
use std::fmt::Debug;

use super::{EmbeddingRequest, EmbeddingResponse};
use crate::domain::DomainError;

/// Trait for embedding providers
///
/// The same provider must embed catalog elements, examples and incoming questions,
/// otherwise similarity scores are meaningless.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync + Debug {
    /// Generate embeddings for the given input
    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, DomainError>;

    /// Get the provider name
    fn provider_name(&self) -> &'static str;

    /// Model identifier recorded alongside persisted vectors
    fn model(&self) -> &str;

    /// Output dimensions
    fn dimensions(&self) -> usize;

    /// Embed one text and return its vector
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>, DomainError> {
        let response = self
            .embed(EmbeddingRequest::single(self.model(), text))
            .await?;

        response
            .into_embeddings()
            .into_iter()
            .next()
            .map(|e| e.into_vector())
            .ok_or_else(|| DomainError::malformed_response(self.provider_name(), "no embedding returned"))
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use crate::domain::embedding::{Embedding, EmbeddingUsage};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    pub struct MockEmbeddingProvider {
        name: &'static str,
        dimensions: usize,
        error: Option<DomainError>,
        calls: AtomicUsize,
    }

    impl MockEmbeddingProvider {
        pub fn new(name: &'static str, dimensions: usize) -> Self {
            Self {
                name,
                dimensions,
                error: None,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn with_error(mut self, error: DomainError) -> Self {
            self.error = Some(error);
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EmbeddingProvider for MockEmbeddingProvider {
        async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, DomainError> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            if let Some(ref error) = self.error {
                return Err(error.clone());
            }

            let inputs = request.inputs();
            let embeddings: Vec<Embedding> = inputs
                .iter()
                .enumerate()
                .map(|(idx, text)| {
                    let hash = text.bytes().fold(0u64, |acc, b| acc.wrapping_add(b as u64));
                    let vector: Vec<f32> = (0..self.dimensions)
                        .map(|i| ((hash.wrapping_add(i as u64) % 1000) as f32 / 1000.0) - 0.5)
                        .collect();

                    Embedding::new(idx, vector)
                })
                .collect();

            let total_tokens = inputs.iter().map(|t| t.len() / 4).sum::<usize>() as u32;

            Ok(EmbeddingResponse::new(
                request.model().to_string(),
                embeddings,
                EmbeddingUsage::new(total_tokens, total_tokens),
            ))
        }

        fn provider_name(&self) -> &'static str {
            self.name
        }

        fn model(&self) -> &str {
            "mock-embedding"
        }

        fn dimensions(&self) -> usize {
            self.dimensions
        }
    }

    mod tests {
        use super::*;

        #[tokio::test]
        async fn test_mock_provider_batch_input() {
            let provider = MockEmbeddingProvider::new("test", 16);
            let request =
                EmbeddingRequest::batch("mock-embedding", vec!["Artist".into(), "Album".into()]);

            let response = provider.embed(request).await.unwrap();

            assert_eq!(response.embeddings().len(), 2);
            assert_eq!(response.embeddings()[1].vector().len(), 16);
        }

        #[tokio::test]
        async fn test_embed_text_is_deterministic() {
            let provider = MockEmbeddingProvider::new("test", 16);

            let first = provider.embed_text("Hello").await.unwrap();
            let second = provider.embed_text("Hello").await.unwrap();

            assert_eq!(first, second);
            assert_eq!(provider.call_count(), 2);
        }

        #[tokio::test]
        async fn test_mock_provider_error() {
            let provider = MockEmbeddingProvider::new("test", 16)
                .with_error(DomainError::unavailable("test", "connection refused"));

            let err = provider.embed_text("Hello").await.unwrap_err();

            assert!(err.is_unavailable());
        }
    }
}
