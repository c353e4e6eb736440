mod chunker;
mod duckdb_store;
pub mod embedding_providers;
mod fs_watcher;
mod logging;
mod manifest_io;
mod merkle_store;
mod path_filter;

pub use chunker::*;
pub use duckdb_store::*;
pub use embedding_providers::*;
pub use fs_watcher::*;
pub use logging::*;
pub use manifest_io::*;
pub use merkle_store::*;
pub use path_filter::*;
