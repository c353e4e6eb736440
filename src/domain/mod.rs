//! # Domain Layer
//!
//! Core business models and repository traits (ports). This layer has no
//! dependency on any concrete storage, parser, or embedding technology.

pub mod error;
pub mod models;
pub mod repositories;

pub use error::*;
pub use models::*;
pub use repositories::*;
