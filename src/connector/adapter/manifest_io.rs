use std::fs;
use std::path::PathBuf;

use tracing::warn;

use crate::application::ManifestRepository;
use crate::domain::{IndexError, Manifest};

/// Persists one manifest per repository as `{data_dir}/manifests/{repo_id}.json`,
/// written via a temp file + rename so a crash mid-write never leaves a
/// corrupt manifest behind (spec §3 "Manifest", §4.1).
pub struct ManifestIo {
    data_dir: PathBuf,
}

impl ManifestIo {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into() }
    }

    fn path_for(&self, repo_id: &str) -> PathBuf {
        self.data_dir.join("manifests").join(format!("{}.json", sanitize(repo_id)))
    }
}

fn sanitize(repo_id: &str) -> String {
    repo_id
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

impl ManifestRepository for ManifestIo {
    fn load(&self, repo_id: &str) -> Result<Option<Manifest>, IndexError> {
        let path = self.path_for(repo_id);
        let text = match fs::read_to_string(&path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(IndexError::from(e)),
        };
        match Manifest::from_json(&text) {
            Ok(manifest) => Ok(Some(manifest)),
            Err(e) => {
                warn!(repo_id, error = %e, "manifest on disk is corrupt, forcing reindex");
                Err(IndexError::ManifestCorrupt(e.to_string()))
            }
        }
    }

    fn save(&self, manifest: &Manifest) -> Result<(), IndexError> {
        let final_path = self.path_for(&manifest.repo_id);
        if let Some(dir) = final_path.parent() {
            fs::create_dir_all(dir)?;
        }
        let tmp_path = final_path.with_extension("json.tmp");
        let json_text = manifest
            .to_json_pretty()
            .map_err(|e| IndexError::internal(format!("failed to serialize manifest: {}", e)))?;
        fs::write(&tmp_path, json_text)?;
        fs::rename(&tmp_path, &final_path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::domain::MerkleNode;

    fn empty_tree() -> MerkleNode {
        MerkleNode::directory("root", BTreeMap::new())
    }

    #[test]
    fn load_returns_none_when_no_manifest_exists() {
        let dir = tempfile::tempdir().unwrap();
        let io = ManifestIo::new(dir.path());
        assert!(io.load("repo-1").unwrap().is_none());
    }

    #[test]
    fn round_trips_a_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let io = ManifestIo::new(dir.path());
        let manifest = Manifest::new("repo-1", "rev-1", empty_tree(), 100);

        io.save(&manifest).unwrap();
        let loaded = io.load("repo-1").unwrap().unwrap();
        assert_eq!(loaded.repo_id, "repo-1");
        assert_eq!(loaded.revision, "rev-1");
    }

    #[test]
    fn save_leaves_no_tmp_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let io = ManifestIo::new(dir.path());
        io.save(&Manifest::new("repo-1", "rev-1", empty_tree(), 0)).unwrap();
        assert!(!io.path_for("repo-1").with_extension("json.tmp").exists());
    }

    #[test]
    fn corrupt_manifest_surfaces_as_manifest_corrupt_error() {
        let dir = tempfile::tempdir().unwrap();
        let manifests_dir = dir.path().join("manifests");
        fs::create_dir_all(&manifests_dir).unwrap();
        fs::write(manifests_dir.join("repo-1.json"), "not json").unwrap();

        let io = ManifestIo::new(dir.path());
        assert!(matches!(io.load("repo-1"), Err(IndexError::ManifestCorrupt(_))));
    }

    #[test]
    fn sanitizes_repo_id_for_filesystem_safety() {
        let dir = tempfile::tempdir().unwrap();
        let io = ManifestIo::new(dir.path());
        let manifest = Manifest::new("org/repo:main", "rev-1", empty_tree(), 0);
        io.save(&manifest).unwrap();
        assert!(io.load("org/repo:main").unwrap().is_some());
    }
}
