use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::UNIX_EPOCH;

use tracing::warn;
use walkdir::WalkDir;

use crate::application::ProjectScanner;
use crate::connector::adapter::path_filter::PathFilter;
use crate::domain::{IndexError, MerkleNode};

/// Intermediate tree shape built while walking the filesystem, before any
/// hash is computed. Lets directory hashes be derived bottom-up once every
/// child is known, rather than rehashing as files stream in.
enum RawEntry {
    File { content: Vec<u8>, size: u64, mtime: i64 },
    Dir(BTreeMap<String, RawEntry>),
}

fn insert_file(tree: &mut BTreeMap<String, RawEntry>, components: &[&str], content: Vec<u8>, size: u64, mtime: i64) {
    match components {
        [] => {}
        [last] => {
            tree.insert((*last).to_string(), RawEntry::File { content, size, mtime });
        }
        [first, rest @ ..] => {
            let entry = tree
                .entry((*first).to_string())
                .or_insert_with(|| RawEntry::Dir(BTreeMap::new()));
            if let RawEntry::Dir(children) = entry {
                insert_file(children, rest, content, size, mtime);
            }
        }
    }
}

fn build_node(path_prefix: &str, name: &str, entry: RawEntry) -> MerkleNode {
    let full_path = if path_prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", path_prefix, name)
    };
    match entry {
        RawEntry::File { content, size, mtime } => MerkleNode::file(full_path, &content, size, mtime),
        RawEntry::Dir(children) => {
            let mut out = BTreeMap::new();
            for (child_name, child_entry) in children {
                let node = build_node(&full_path, &child_name, child_entry);
                out.insert(child_name, node);
            }
            MerkleNode::directory(full_path, out)
        }
    }
}

/// Builds and diffs the project's Merkle tree (spec §4.2), applying the
/// path/ignore rules of §4.1 while walking. The root directory itself is
/// represented with an empty path so its hash is purely a function of its
/// children's names and hashes.
pub struct MerkleStore {
    extensions: Vec<String>,
    data_dir_name: String,
}

impl MerkleStore {
    pub fn new(extensions: Vec<String>, data_dir_name: impl Into<String>) -> Self {
        Self {
            extensions,
            data_dir_name: data_dir_name.into(),
        }
    }
}

impl ProjectScanner for MerkleStore {
    fn scan(&self, root: &Path) -> Result<MerkleNode, IndexError> {
        let filter = PathFilter::new(root, &self.extensions, self.data_dir_name.clone());
        let mut tree: BTreeMap<String, RawEntry> = BTreeMap::new();

        let walker = WalkDir::new(root).follow_links(false).into_iter().filter_entry(|entry| {
            if entry.path() == root {
                return true;
            }
            match entry.path().strip_prefix(root) {
                Ok(relative) => filter.accept_path(relative, entry.file_type().is_dir()).unwrap_or(false),
                Err(_) => false,
            }
        });

        for item in walker {
            let entry = match item {
                Ok(e) => e,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable directory entry during scan");
                    continue;
                }
            };
            if entry.path() == root || entry.file_type().is_dir() {
                continue;
            }

            let relative = entry.path().strip_prefix(root).map_err(|e| IndexError::internal(e.to_string()))?;
            let content = match fs::read(entry.path()) {
                Ok(c) => c,
                Err(e) => {
                    warn!(file = %relative.display(), error = %e, "skipping unreadable file during scan");
                    continue;
                }
            };
            if PathFilter::is_binary(&content) {
                continue;
            }

            let metadata = entry.metadata().map_err(|e| IndexError::internal(e.to_string()))?;
            let size = metadata.len();
            let mtime = metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0);

            let relative_str = relative.to_string_lossy().replace('\\', "/");
            let components: Vec<&str> = relative_str.split('/').collect();
            insert_file(&mut tree, &components, content, size, mtime);
        }

        let mut root_children = BTreeMap::new();
        for (name, entry) in tree {
            let node = build_node("", &name, entry);
            root_children.insert(name, node);
        }
        Ok(MerkleNode::directory("", root_children))
    }

    fn read_file(&self, root: &Path, relative_path: &str) -> Result<String, IndexError> {
        let full_path = root.join(relative_path);
        fs::read_to_string(&full_path).map_err(IndexError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[test]
    fn scans_nested_files_into_a_deterministic_tree() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/main.rs", "fn main() {}");
        write(dir.path(), "src/lib.rs", "pub fn hi() {}");
        write(dir.path(), "README.md", "hello");

        let scanner = MerkleStore::new(vec![], ".codelens");
        let tree = scanner.scan(dir.path()).unwrap();
        let mut paths = tree.file_paths();
        paths.sort();
        assert_eq!(paths, vec!["README.md".to_string(), "src/lib.rs".to_string(), "src/main.rs".to_string()]);
    }

    #[test]
    fn excludes_git_and_honors_gitignore() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), ".gitignore", "ignored.txt\n");
        write(dir.path(), ".git/HEAD", "ref: refs/heads/main");
        write(dir.path(), "ignored.txt", "skip me");
        write(dir.path(), "kept.txt", "keep me");

        let scanner = MerkleStore::new(vec![], ".codelens");
        let tree = scanner.scan(dir.path()).unwrap();
        let paths = tree.file_paths();
        assert_eq!(paths, vec!["kept.txt".to_string()]);
    }

    #[test]
    fn skips_binary_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("image.bin"), [0u8, 1, 2, 3]).unwrap();
        write(dir.path(), "src.rs", "fn main() {}");

        let scanner = MerkleStore::new(vec![], ".codelens");
        let tree = scanner.scan(dir.path()).unwrap();
        assert_eq!(tree.file_paths(), vec!["src.rs".to_string()]);
    }

    #[test]
    fn read_file_reads_relative_to_root() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/main.rs", "fn main() {}");
        let scanner = MerkleStore::new(vec![], ".codelens");
        let content = scanner.read_file(dir.path(), "src/main.rs").unwrap();
        assert_eq!(content, "fn main() {}");
    }

    #[test]
    fn identical_trees_hash_equal_regardless_of_walk_order() {
        let dir_a = tempfile::tempdir().unwrap();
        write(dir_a.path(), "a.rs", "1");
        write(dir_a.path(), "b.rs", "2");

        let dir_b = tempfile::tempdir().unwrap();
        write(dir_b.path(), "b.rs", "2");
        write(dir_b.path(), "a.rs", "1");

        let scanner = MerkleStore::new(vec![], ".codelens");
        let tree_a = scanner.scan(dir_a.path()).unwrap();
        let tree_b = scanner.scan(dir_b.path()).unwrap();
        assert_eq!(tree_a.hash(), tree_b.hash());
    }
}
