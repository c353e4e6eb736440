//! # Connector Layer
//!
//! External integrations implementing the application layer's ports:
//! DuckDB-backed storage, tree-sitter based chunking, embedding providers,
//! filesystem scanning/watching, manifest persistence, and logging.

pub mod adapter;
pub mod api;

pub use adapter::*;
pub use api::*;
