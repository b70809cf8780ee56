//! Retrieval index: building, persistence and lookup with fallbacks

mod builder;
mod error;
mod file_store;
mod retriever;

pub use builder::IndexBuilder;
pub use error::IndexError;
pub use file_store::{load_examples, IndexFileStore, INDEX_FORMAT_VERSION};
pub use retriever::{LookupSource, SchemaLookup, SchemaRetriever};
