use serde::{Deserialize, Serialize};

use super::MerkleNode;

/// The schema version the running core expects. A manifest with a
/// different version forces a reindex (spec §3 Manifest, §4.8 step 1).
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManifestStats {
    pub files: u64,
    pub symbols: u64,
    pub chunks: u64,
    pub refs: u64,
}

/// The persisted summary of the last successful index run (spec §3
/// "Manifest"). Written atomically (temp file + rename) after every
/// successful run; `tree_root` is mandatory here (resolved open question,
/// see SPEC_FULL.md §9) and used directly for the next run's diff.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    pub schema_version: u32,
    pub created_at: i64,
    pub updated_at: i64,
    pub repo_id: String,
    pub revision: String,
    pub tree_root: MerkleNode,
    pub stats: ManifestStats,
}

impl Manifest {
    pub fn new(repo_id: impl Into<String>, revision: impl Into<String>, tree_root: MerkleNode, now: i64) -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            created_at: now,
            updated_at: now,
            repo_id: repo_id.into(),
            revision: revision.into(),
            tree_root,
            stats: ManifestStats::default(),
        }
    }

    pub fn with_stats(mut self, stats: ManifestStats) -> Self {
        self.stats = stats;
        self
    }

    pub fn touch(&mut self, now: i64) {
        self.updated_at = now;
    }

    /// Whether this manifest can be used as the baseline for an incremental
    /// diff, i.e. its schema matches the running core's.
    pub fn is_current_schema(&self) -> bool {
        self.schema_version == CURRENT_SCHEMA_VERSION
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn empty_tree() -> MerkleNode {
        MerkleNode::directory("root", BTreeMap::new())
    }

    #[test]
    fn new_manifest_is_current_schema() {
        let m = Manifest::new("repo", "rev-1", empty_tree(), 0);
        assert!(m.is_current_schema());
        assert_eq!(m.schema_version, CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn stale_schema_version_detected() {
        let mut m = Manifest::new("repo", "rev-1", empty_tree(), 0);
        m.schema_version = CURRENT_SCHEMA_VERSION - 1;
        assert!(!m.is_current_schema());
    }

    #[test]
    fn round_trips_through_json() {
        let m = Manifest::new("repo", "rev-1", empty_tree(), 42).with_stats(ManifestStats {
            files: 3,
            symbols: 10,
            chunks: 12,
            refs: 20,
        });
        let json = m.to_json_pretty().unwrap();
        let restored = Manifest::from_json(&json).unwrap();
        assert_eq!(restored.repo_id, "repo");
        assert_eq!(restored.stats.chunks, 12);
    }

    #[test]
    fn rejects_unknown_fields() {
        let json = r#"{
            "schema_version": 1, "created_at": 0, "updated_at": 0,
            "repo_id": "r", "revision": "1",
            "tree_root": {"type": "directory", "path": "root", "hash": "x", "children": {}},
            "stats": {"files": 0, "symbols": 0, "chunks": 0, "refs": 0},
            "unexpected_field": true
        }"#;
        assert!(Manifest::from_json(json).is_err());
    }
}
