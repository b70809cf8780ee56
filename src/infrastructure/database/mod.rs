//! SQLite-backed query executor and catalog loader

mod sqlite;

pub use sqlite::SqliteExecutor;
