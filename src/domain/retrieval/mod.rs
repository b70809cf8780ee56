//! Similarity search over schema elements and few-shot examples

mod error;
mod example;
mod index;

pub use error::RetrievalError;
pub use example::Example;
pub use index::{RetrievalIndex, RetrievalResult, Scored};
