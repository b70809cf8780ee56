//! Domain layer - Core types, collaborator traits and pure services

pub mod catalog;
pub mod database;
pub mod embedding;
pub mod error;
pub mod llm;
pub mod retrieval;
pub mod validation;
pub mod workflow;

pub use catalog::{ColumnSchema, SchemaCatalog, SchemaElement, SchemaElementKind, TableSchema};
pub use database::{ExecutionError, ExecutionErrorKind, QueryExecutor, QueryRows};
pub use embedding::{EmbeddingProvider, EmbeddingRequest, EmbeddingResponse};
pub use error::DomainError;
pub use llm::{LlmProvider, LlmRequest, LlmResponse, Message, MessageRole};
pub use retrieval::{Example, RetrievalError, RetrievalIndex, RetrievalResult};
pub use validation::{RejectionReason, SqlValidator, ValidationVerdict};
pub use workflow::{AgentSettings, RunFailure, RunOutcome, RunResult, TraceEntry, WorkflowState};
