use std::path::Path;

use ignore::gitignore::{Gitignore, GitignoreBuilder};

use crate::domain::IndexError;

/// Directory/file names that are always dropped regardless of `.gitignore`
/// content (spec §4.1 rule a).
const EXCLUDED_BUILTIN_SEGMENTS: &[&str] = &[".git", "node_modules"];

/// How many leading bytes of a file are scanned for a NUL byte before it's
/// treated as binary (spec §4.1 rule d).
const BINARY_SCAN_WINDOW: usize = 8 * 1024;

/// Applies the project's path/ignore rules in the order spec §4.1 defines
/// them: built-in excludes, `.gitignore`, extension allow-list, then (once
/// content is available) a binary sniff. Backed by the `ignore` crate's
/// `Gitignore` matcher, same crate the chunker's file walk already pulls in.
pub struct PathFilter {
    gitignore: Gitignore,
    extensions: Vec<String>,
    data_dir_name: String,
}

impl PathFilter {
    /// `extensions` is the configured allow-list (lower-cased, leading dots
    /// trimmed); an empty list means "all text files". `data_dir_name` is
    /// the project's internal data directory (e.g. `.codelens`), excluded
    /// like `.git` regardless of gitignore content.
    pub fn new(root: &Path, extensions: &[String], data_dir_name: impl Into<String>) -> Self {
        let gitignore_path = root.join(".gitignore");
        let gitignore = if gitignore_path.is_file() {
            let mut builder = GitignoreBuilder::new(root);
            match builder.add(&gitignore_path) {
                Some(err) => {
                    tracing::warn!(error = %err, "failed to parse .gitignore, ignoring it");
                    Gitignore::empty()
                }
                None => builder.build().unwrap_or_else(|_| Gitignore::empty()),
            }
        } else {
            Gitignore::empty()
        };

        Self {
            gitignore,
            extensions: extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            data_dir_name: data_dir_name.into(),
        }
    }

    fn has_excluded_segment(&self, relative_path: &Path) -> bool {
        relative_path.components().any(|c| {
            let name = c.as_os_str().to_string_lossy();
            EXCLUDED_BUILTIN_SEGMENTS.contains(&name.as_ref()) || name == self.data_dir_name
        })
    }

    fn extension_allowed(&self, relative_path: &Path) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        relative_path
            .extension()
            .map(|ext| {
                let ext = ext.to_string_lossy().to_lowercase();
                self.extensions.iter().any(|allowed| *allowed == ext)
            })
            .unwrap_or(false)
    }

    /// Rules (a)-(c): built-in excludes, gitignore match, extension
    /// allow-list. Directories only go through (a) and (b), since an
    /// extension test on a directory entry is meaningless.
    pub fn accept_path(&self, relative_path: &Path, is_dir: bool) -> Result<bool, IndexError> {
        if relative_path.as_os_str().is_empty() {
            return Err(IndexError::path_rejected("empty relative path"));
        }
        if relative_path.is_absolute() {
            return Err(IndexError::path_rejected(format!(
                "expected a path relative to the project root, got {}",
                relative_path.display()
            )));
        }

        if self.has_excluded_segment(relative_path) {
            return Ok(false);
        }
        if self.gitignore.matched(relative_path, is_dir).is_ignore() {
            return Ok(false);
        }
        if is_dir {
            return Ok(true);
        }
        Ok(self.extension_allowed(relative_path))
    }

    /// Rule (d): a file is binary if a NUL byte shows up in its first 8 KiB.
    pub fn is_binary(content: &[u8]) -> bool {
        let window = &content[..content.len().min(BINARY_SCAN_WINDOW)];
        window.contains(&0)
    }

    /// Full predicate for a file about to be read/chunked: (a)-(d).
    pub fn accept_file(&self, relative_path: &Path, content: &[u8]) -> Result<bool, IndexError> {
        if !self.accept_path(relative_path, false)? {
            return Ok(false);
        }
        Ok(!Self::is_binary(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn excludes_builtin_segments_regardless_of_gitignore() {
        let dir = tempfile::tempdir().unwrap();
        let filter = PathFilter::new(dir.path(), &[], ".codelens");
        assert!(!filter.accept_path(Path::new(".git/config"), false).unwrap());
        assert!(!filter.accept_path(Path::new("node_modules/pkg/index.js"), false).unwrap());
        assert!(!filter.accept_path(Path::new(".codelens/manifest.json"), false).unwrap());
    }

    #[test]
    fn honors_gitignore_rules_from_repo_root() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".gitignore"), "*.log\ntarget/\n").unwrap();
        let filter = PathFilter::new(dir.path(), &[], ".codelens");
        assert!(!filter.accept_path(Path::new("debug.log"), false).unwrap());
        assert!(!filter.accept_path(Path::new("target/release/bin"), false).unwrap());
        assert!(filter.accept_path(Path::new("src/main.rs"), false).unwrap());
    }

    #[test]
    fn enforces_extension_allow_list_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        let filter = PathFilter::new(dir.path(), &["rs".to_string(), ".py".to_string()], ".codelens");
        assert!(filter.accept_path(Path::new("src/main.rs"), false).unwrap());
        assert!(filter.accept_path(Path::new("scripts/build.PY"), false).unwrap());
        assert!(!filter.accept_path(Path::new("README.md"), false).unwrap());
    }

    #[test]
    fn empty_allow_list_accepts_any_extension() {
        let dir = tempfile::tempdir().unwrap();
        let filter = PathFilter::new(dir.path(), &[], ".codelens");
        assert!(filter.accept_path(Path::new("README.md"), false).unwrap());
    }

    #[test]
    fn detects_binary_content_via_null_byte() {
        assert!(PathFilter::is_binary(b"hello\0world"));
        assert!(!PathFilter::is_binary(b"hello world"));
    }

    #[test]
    fn rejects_malformed_absolute_path() {
        let dir = tempfile::tempdir().unwrap();
        let filter = PathFilter::new(dir.path(), &[], ".codelens");
        assert!(filter.accept_path(Path::new("/etc/passwd"), false).is_err());
    }
}
