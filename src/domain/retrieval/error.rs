use thiserror::Error;

/// Why a retrieval could not be answered from the index
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RetrievalError {
    #[error("Embedding service unavailable: {message}")]
    EmbeddingUnavailable { message: String },

    #[error("Query vector has {actual} dimensions, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embedding service returned an empty vector")]
    EmptyEmbedding,
}

impl RetrievalError {
    pub fn embedding_unavailable(message: impl Into<String>) -> Self {
        Self::EmbeddingUnavailable {
            message: message.into(),
        }
    }
}
