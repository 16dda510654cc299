//! rag-core - Core types and traits for the answer pipeline
//!
//! This crate provides the data model, the interfaces of the external
//! collaborators (embedder, indexes, cross-encoder, chat model, history
//! store, web search), error handling and configuration shared by the
//! rest of the workspace.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::*;
pub use error::{RagError, Result};
pub use traits::*;
pub use types::*;
