//! Wiring layer: turns a [`crate::config::Config`] into concrete adapters
//! and hands back owned use cases. No module-level mutable singletons.

mod container;

pub use container::*;
