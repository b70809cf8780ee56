use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionReason {
    SyntaxError,
    MultipleStatements,
    WriteOperationForbidden,
    DangerousPattern,
}

impl RejectionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SyntaxError => "SYNTAX_ERROR",
            Self::MultipleStatements => "MULTIPLE_STATEMENTS",
            Self::WriteOperationForbidden => "WRITE_OPERATION_FORBIDDEN",
            Self::DangerousPattern => "DANGEROUS_PATTERN",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("{reason}: {detail}")]
pub struct ValidationRejection {
    pub reason: RejectionReason,
    pub detail: String,
}

/// Outcome of validating one candidate statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ValidationVerdict {
    Ok { sanitized_sql: String },
    Rejected(ValidationRejection),
}

impl ValidationVerdict {
    pub fn ok(sanitized_sql: impl Into<String>) -> Self {
        Self::Ok {
            sanitized_sql: sanitized_sql.into(),
        }
    }

    pub fn rejected(reason: RejectionReason, detail: impl Into<String>) -> Self {
        Self::Rejected(ValidationRejection {
            reason,
            detail: detail.into(),
        })
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }

    pub fn sanitized_sql(&self) -> Option<&str> {
        match self {
            Self::Ok { sanitized_sql } => Some(sanitized_sql),
            Self::Rejected(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<&ValidationRejection> {
        match self {
            Self::Ok { .. } => None,
            Self::Rejected(rejection) => Some(rejection),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_display() {
        let verdict = ValidationVerdict::rejected(RejectionReason::MultipleStatements, "2 statements");
        assert_eq!(
            verdict.rejection().map(|r| r.to_string()),
            Some("MULTIPLE_STATEMENTS: 2 statements".to_string())
        );
        assert!(verdict.sanitized_sql().is_none());
    }

    #[test]
    fn test_reason_serializes_as_code() {
        let json = serde_json::to_string(&RejectionReason::WriteOperationForbidden).unwrap();
        assert_eq!(json, "\"WRITE_OPERATION_FORBIDDEN\"");
    }
}
