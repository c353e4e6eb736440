//! # codelens
//!
//! A local, embedded code-search engine: watches a project tree, chunks
//! source files with tree-sitter, embeds the chunks, and answers hybrid
//! vector + lexical search queries — all from a single DuckDB file, with
//! no server process.
//!
//! ## Architecture
//!
//! The crate is organized following Domain-Driven Design principles:
//!
//! - `domain`: Core business models, repository traits, and service interfaces
//! - `application`: Use cases and orchestration logic
//! - `connector`: External integrations (DuckDB, tree-sitter, embedding providers, filesystem)
//! - `config`: Project configuration and adapter selection

pub mod application;
pub mod config;
pub mod connector;
pub mod domain;

// Re-export commonly used types
pub use application::*;
pub use config::*;
pub use connector::*;
pub use domain::*;
