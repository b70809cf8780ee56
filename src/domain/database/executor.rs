use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use super::{ExecutionError, QueryRows};

/// Executes validated SQL read-only.
///
/// Implementations must refuse write statements even if handed one, and must not
/// return more rows than their configured cap.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, sql: &str) -> Result<QueryRows, ExecutionError>;
}
