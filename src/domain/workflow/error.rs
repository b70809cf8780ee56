//! Run-level failures surfaced to the user

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The only failures that escape a run; every other failure has a local recovery path
#[derive(Debug, Clone, Error, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunFailure {
    #[error("Could not answer \"{question}\" after {attempts} attempt(s). Last error: {last_error}")]
    RetryExhausted {
        question: String,
        attempts: u32,
        last_error: String,
    },

    #[error("{service} unavailable while answering \"{question}\" ({attempts} attempt(s) made): {last_error}")]
    CollaboratorUnavailable {
        question: String,
        attempts: u32,
        service: String,
        last_error: String,
    },
}

impl RunFailure {
    pub fn retry_exhausted(question: impl Into<String>, attempts: u32, last_error: impl Into<String>) -> Self {
        Self::RetryExhausted {
            question: question.into(),
            attempts,
            last_error: last_error.into(),
        }
    }

    pub fn unavailable(
        question: impl Into<String>,
        attempts: u32,
        service: impl Into<String>,
        last_error: impl Into<String>,
    ) -> Self {
        Self::CollaboratorUnavailable {
            question: question.into(),
            attempts,
            service: service.into(),
            last_error: last_error.into(),
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Self::RetryExhausted { attempts, .. } | Self::CollaboratorUnavailable { attempts, .. } => *attempts,
        }
    }

    pub fn is_retry_exhausted(&self) -> bool {
        matches!(self, Self::RetryExhausted { .. })
    }
}
