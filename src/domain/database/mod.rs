//! Database collaborator: read-only execution of validated statements

mod error;
mod executor;
mod rows;

pub use error::{ExecutionError, ExecutionErrorKind};
pub use executor::QueryExecutor;
pub use rows::QueryRows;

#[cfg(test)]
pub use executor::MockQueryExecutor;
