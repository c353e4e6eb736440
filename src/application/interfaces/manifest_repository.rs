use crate::domain::{IndexError, Manifest};

/// Reads and atomically persists the per-repository manifest (spec §3
/// "Manifest", §4.1 "atomic write"). Implementations write to a temp file
/// and rename over the final path so a crash mid-write never leaves a
/// corrupt manifest on disk.
pub trait ManifestRepository: Send + Sync {
    fn load(&self, repo_id: &str) -> Result<Option<Manifest>, IndexError>;

    fn save(&self, manifest: &Manifest) -> Result<(), IndexError>;
}
