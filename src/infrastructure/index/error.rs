use thiserror::Error;

use crate::domain::DomainError;

/// Failures while building, reading or writing the retrieval index
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Failed to access {path}: {message}")]
    Io { path: String, message: String },

    #[error("Invalid index file {path}: {message}")]
    Format { path: String, message: String },

    #[error("Index file format {found} is not supported (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("Embedding failed while building the index: {0}")]
    Embedding(#[from] DomainError),

    #[error("Embedding service returned {actual} vectors for {expected} inputs")]
    VectorCount { expected: usize, actual: usize },
}

impl IndexError {
    pub fn io(path: impl Into<String>, error: impl ToString) -> Self {
        Self::Io {
            path: path.into(),
            message: error.to_string(),
        }
    }

    pub fn format(path: impl Into<String>, error: impl ToString) -> Self {
        Self::Format {
            path: path.into(),
            message: error.to_string(),
        }
    }
}
