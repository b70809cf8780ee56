//! Embedding provider implementations

mod factory;
mod hashing;
mod openai;

pub use factory::EmbeddingProviderFactory;
pub use hashing::HashingEmbeddingProvider;
pub(crate) use hashing::tokenize;
pub use openai::OpenAiEmbeddingProvider;

pub use super::llm::{HttpClient, HttpClientTrait};
