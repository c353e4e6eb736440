pub mod batch_pipeline;
mod find_usages;
mod index_project;
mod lifecycle;
mod rrf_fuse;
mod search_code;
mod watch_debouncer;

pub use find_usages::*;
pub use index_project::*;
pub use lifecycle::*;
pub use rrf_fuse::*;
pub use search_code::*;
pub use watch_debouncer::*;
