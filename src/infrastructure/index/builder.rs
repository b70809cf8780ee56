use std::sync::Arc;

use tracing::{debug, info, instrument};

use super::IndexError;
use crate::domain::catalog::SchemaCatalog;
use crate::domain::embedding::{EmbeddingProvider, EmbeddingRequest};
use crate::domain::retrieval::{Example, RetrievalIndex};

const EMBED_BATCH_SIZE: usize = 256;

/// Embeds a catalog and an example set into a fresh [`RetrievalIndex`]
#[derive(Debug, Clone)]
pub struct IndexBuilder {
    embedder: Arc<dyn EmbeddingProvider>,
}

impl IndexBuilder {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { embedder }
    }

    #[instrument(skip_all, fields(tables = catalog.tables.len(), examples = examples.len()))]
    pub async fn build(
        &self,
        catalog: &SchemaCatalog,
        examples: &[Example],
    ) -> Result<RetrievalIndex, IndexError> {
        let elements = catalog.elements();

        let element_vectors = self
            .embed_all(elements.iter().map(|e| e.description.clone()).collect())
            .await?;
        let example_vectors = self
            .embed_all(examples.iter().map(|e| e.question.clone()).collect())
            .await?;

        let dimensions = element_vectors
            .first()
            .or(example_vectors.first())
            .map(Vec::len)
            .unwrap_or_else(|| self.embedder.dimensions());

        let elements = elements
            .into_iter()
            .zip(element_vectors)
            .map(|(element, vector)| element.with_embedding(vector))
            .collect::<Vec<_>>();
        let examples = examples
            .iter()
            .cloned()
            .zip(example_vectors)
            .map(|(example, vector)| example.with_embedding(vector))
            .collect::<Vec<_>>();

        info!(
            model = self.embedder.model(),
            dimensions,
            elements = elements.len(),
            examples = examples.len(),
            "Built retrieval index"
        );

        Ok(RetrievalIndex::new(
            self.embedder.model(),
            dimensions,
            catalog.fingerprint(),
            elements,
            examples,
        ))
    }

    async fn embed_all(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, IndexError> {
        let mut vectors = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(EMBED_BATCH_SIZE) {
            let request = EmbeddingRequest::batch(self.embedder.model(), chunk.to_vec());
            let batch = self.embedder.embed(request).await?.into_vectors();

            if batch.len() != chunk.len() {
                return Err(IndexError::VectorCount {
                    expected: chunk.len(),
                    actual: batch.len(),
                });
            }

            debug!(count = batch.len(), "Embedded batch");
            vectors.extend(batch);
        }

        Ok(vectors)
    }
}
