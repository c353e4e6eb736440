use std::path::Path;

use crate::domain::{IndexError, MerkleNode};

/// Walks a project directory into a content-addressed [`MerkleNode`] tree
/// and fetches individual file contents on demand (spec §4.2). Kept behind
/// a port so the orchestration use case doesn't depend on the filesystem
/// or gitignore-walking crates directly.
pub trait ProjectScanner: Send + Sync {
    /// Builds the full Merkle tree for `root`, applying the project's
    /// ignore rules and binary-file detection (spec §4.2 "path filtering").
    fn scan(&self, root: &Path) -> Result<MerkleNode, IndexError>;

    /// Reads one file's content as UTF-8 text, relative to `root`.
    fn read_file(&self, root: &Path, relative_path: &str) -> Result<String, IndexError>;
}
