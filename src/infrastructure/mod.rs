//! Infrastructure layer - Implementations of the domain seams

pub mod database;
pub mod embedding;
pub mod index;
pub mod llm;
pub mod logging;
pub mod observability;
pub mod workflow;
