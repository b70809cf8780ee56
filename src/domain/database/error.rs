use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionErrorKind {
    Syntax,
    MissingObject,
    Timeout,
    Permission,
    /// Database unreachable; not something a regenerated query can fix
    Connection,
    Other,
}

/// Typed failure returned by a query executor
#[derive(Debug, Clone, Error, PartialEq, Serialize, Deserialize)]
#[error("{message}")]
pub struct ExecutionError {
    pub kind: ExecutionErrorKind,
    pub message: String,
}

impl ExecutionError {
    pub fn new(kind: ExecutionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn syntax(message: impl Into<String>) -> Self {
        Self::new(ExecutionErrorKind::Syntax, message)
    }

    pub fn missing_object(message: impl Into<String>) -> Self {
        Self::new(ExecutionErrorKind::MissingObject, message)
    }

    pub fn timeout(timeout_ms: u64) -> Self {
        Self::new(
            ExecutionErrorKind::Timeout,
            format!("query timed out after {}ms", timeout_ms),
        )
    }

    pub fn permission(message: impl Into<String>) -> Self {
        Self::new(ExecutionErrorKind::Permission, message)
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(ExecutionErrorKind::Connection, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(ExecutionErrorKind::Other, message)
    }

    /// Query-level failures feed back into generation; connection failures end the run
    pub fn is_retryable(&self) -> bool {
        self.kind != ExecutionErrorKind::Connection
    }

    /// Classify a SQLite error message
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();

        let kind = if lower.contains("no such table")
            || lower.contains("no such column")
            || lower.contains("no such function")
        {
            ExecutionErrorKind::MissingObject
        } else if lower.contains("syntax error")
            || lower.contains("incomplete input")
            || lower.contains("unrecognized token")
            || lower.contains("ambiguous column")
            || lower.contains("misuse of aggregate")
        {
            ExecutionErrorKind::Syntax
        } else if lower.contains("readonly")
            || lower.contains("read-only")
            || lower.contains("not authorized")
        {
            ExecutionErrorKind::Permission
        } else if lower.contains("interrupted") || lower.contains("timed out") {
            ExecutionErrorKind::Timeout
        } else if lower.contains("unable to open") || lower.contains("pool timed out") {
            ExecutionErrorKind::Connection
        } else {
            ExecutionErrorKind::Other
        };

        Self { kind, message }
    }
}
