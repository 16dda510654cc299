//! rag-store - SQLite storage layer
//!
//! This crate provides the bundled implementations of the pipeline's
//! storage collaborators on top of SQLite:
//!
//! - a tenant-partitioned passage index answering both vector (exact
//!   cosine) and lexical (FTS5 BM25) queries, and
//! - a per-session conversation history store.

mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

// Re-export schema for testing/migrations
pub use schema::{SCHEMA, SCHEMA_VERSION};
