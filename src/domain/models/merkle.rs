use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A content-addressed node in the project's Merkle tree (spec §3
/// "MerkleNode", §4.2). A file node's hash is `SHA256(content)`; a
/// directory node's hash is `SHA256` of its sorted `"name:childHash\n"`
/// lines, so a node's hash is a pure function of its descendants and the
/// tree is deterministic regardless of filesystem enumeration order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MerkleNode {
    File {
        path: String,
        hash: String,
        size: u64,
        mtime: i64,
    },
    Directory {
        path: String,
        hash: String,
        children: BTreeMap<String, MerkleNode>,
    },
}

impl MerkleNode {
    pub fn file(path: impl Into<String>, content: &[u8], size: u64, mtime: i64) -> Self {
        let hash = hash_bytes(content);
        MerkleNode::File {
            path: path.into(),
            hash,
            size,
            mtime,
        }
    }

    /// Builds a directory node from already-hashed children. Children are
    /// stored (and hashed) in a `BTreeMap`, i.e. sorted by name, so the
    /// resulting hash never depends on readdir order.
    pub fn directory(path: impl Into<String>, children: BTreeMap<String, MerkleNode>) -> Self {
        let hash = hash_directory_children(&children);
        MerkleNode::Directory {
            path: path.into(),
            hash,
            children,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            MerkleNode::File { path, .. } => path,
            MerkleNode::Directory { path, .. } => path,
        }
    }

    pub fn hash(&self) -> &str {
        match self {
            MerkleNode::File { hash, .. } => hash,
            MerkleNode::Directory { hash, .. } => hash,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, MerkleNode::File { .. })
    }

    pub fn children(&self) -> Option<&BTreeMap<String, MerkleNode>> {
        match self {
            MerkleNode::Directory { children, .. } => Some(children),
            MerkleNode::File { .. } => None,
        }
    }

    /// Lists every file path contained (transitively) in this subtree.
    pub fn file_paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_file_paths(&mut out);
        out
    }

    fn collect_file_paths(&self, out: &mut Vec<String>) {
        match self {
            MerkleNode::File { path, .. } => out.push(path.clone()),
            MerkleNode::Directory { children, .. } => {
                for child in children.values() {
                    child.collect_file_paths(out);
                }
            }
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }
}

fn hash_bytes(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

fn hash_directory_children(children: &BTreeMap<String, MerkleNode>) -> String {
    let mut hasher = Sha256::new();
    for (name, node) in children {
        hasher.update(format!("{}:{}\n", name, node.hash()).as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// The result of comparing two Merkle trees (spec §4.2 `diff`): paths that
/// only exist in `next`, paths whose hash changed, and paths that only
/// existed in `prev`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MerkleDiff {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub deleted: Vec<String>,
}

/// Structural diff between two Merkle trees. Equal directory hashes
/// short-circuit the entire subtree (no recursion needed) since an equal
/// hash implies equal included content by construction.
pub fn diff(prev: Option<&MerkleNode>, next: Option<&MerkleNode>) -> MerkleDiff {
    let mut out = MerkleDiff::default();
    diff_into(prev, next, &mut out);
    out
}

fn diff_into(prev: Option<&MerkleNode>, next: Option<&MerkleNode>, out: &mut MerkleDiff) {
    match (prev, next) {
        (None, None) => {}
        (None, Some(n)) => out.added.extend(n.file_paths()),
        (Some(p), None) => out.deleted.extend(p.file_paths()),
        (Some(p), Some(n)) => {
            if p.hash() == n.hash() {
                return;
            }
            match (p, n) {
                (MerkleNode::File { path, .. }, MerkleNode::File { .. }) => {
                    out.modified.push(path.clone());
                }
                (MerkleNode::Directory { children: pc, .. }, MerkleNode::Directory { children: nc, .. }) => {
                    let mut names: Vec<&String> = pc.keys().chain(nc.keys()).collect();
                    names.sort();
                    names.dedup();
                    for name in names {
                        diff_into(pc.get(name), nc.get(name), out);
                    }
                }
                // A path changed type (file <-> directory): treat uniformly
                // as delete-then-add of everything under both sides.
                (p, n) => {
                    out.deleted.extend(p.file_paths());
                    out.added.extend(n.file_paths());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(path: &str, content: &[u8]) -> MerkleNode {
        MerkleNode::file(path, content, content.len() as u64, 0)
    }

    #[test]
    fn file_hash_is_pure_function_of_content() {
        let a = leaf("a.rs", b"fn a() {}");
        let b = leaf("a.rs", b"fn a() {}");
        let c = leaf("a.rs", b"fn b() {}");
        assert_eq!(a.hash(), b.hash());
        assert_ne!(a.hash(), c.hash());
    }

    #[test]
    fn directory_hash_is_independent_of_insertion_order() {
        let mut m1 = BTreeMap::new();
        m1.insert("a.rs".to_string(), leaf("a.rs", b"1"));
        m1.insert("b.rs".to_string(), leaf("b.rs", b"2"));

        let mut m2 = BTreeMap::new();
        m2.insert("b.rs".to_string(), leaf("b.rs", b"2"));
        m2.insert("a.rs".to_string(), leaf("a.rs", b"1"));

        let d1 = MerkleNode::directory("root", m1);
        let d2 = MerkleNode::directory("root", m2);
        assert_eq!(d1.hash(), d2.hash());
    }

    #[test]
    fn round_trip_serialization_preserves_hash() {
        let mut children = BTreeMap::new();
        children.insert("a.rs".to_string(), leaf("a.rs", b"hello"));
        let dir = MerkleNode::directory("root", children);

        let json = dir.to_json().unwrap();
        let restored = MerkleNode::from_json(&json).unwrap();
        assert_eq!(dir.hash(), restored.hash());
        assert_eq!(dir, restored);
    }

    #[test]
    fn diff_detects_added_modified_deleted() {
        let mut prev_children = BTreeMap::new();
        prev_children.insert("a.rs".to_string(), leaf("a.rs", b"old"));
        prev_children.insert("gone.rs".to_string(), leaf("gone.rs", b"bye"));
        let prev = MerkleNode::directory("root", prev_children);

        let mut next_children = BTreeMap::new();
        next_children.insert("a.rs".to_string(), leaf("a.rs", b"new"));
        next_children.insert("new.rs".to_string(), leaf("new.rs", b"fresh"));
        let next = MerkleNode::directory("root", next_children);

        let d = diff(Some(&prev), Some(&next));
        assert_eq!(d.added, vec!["new.rs".to_string()]);
        assert_eq!(d.modified, vec!["a.rs".to_string()]);
        assert_eq!(d.deleted, vec!["gone.rs".to_string()]);
    }

    #[test]
    fn diff_short_circuits_unchanged_subtrees() {
        let mut children = BTreeMap::new();
        children.insert("a.rs".to_string(), leaf("a.rs", b"same"));
        let prev = MerkleNode::directory("root", children.clone());
        let next = MerkleNode::directory("root", children);

        let d = diff(Some(&prev), Some(&next));
        assert!(d.added.is_empty() && d.modified.is_empty() && d.deleted.is_empty());
    }

    #[test]
    fn empty_to_empty_diff_is_empty() {
        let d = diff(None, None);
        assert_eq!(d, MerkleDiff::default());
    }
}
