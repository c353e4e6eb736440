use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::warn;

use crate::application::{ChangeKind, RawChange};
use crate::connector::adapter::path_filter::PathFilter;
use crate::domain::IndexError;

fn classify(kind: &notify::EventKind) -> ChangeKind {
    use notify::EventKind::*;
    match kind {
        Create(_) => ChangeKind::Created,
        Remove(_) => ChangeKind::Removed,
        _ => ChangeKind::Modified,
    }
}

/// Bridges OS filesystem events into the pure `WatchDebouncer`'s input
/// (spec §4.10). Applies the same path/ignore rules as the initial scan
/// (`PathFilter`) so a change under `.git` or `node_modules` never reaches
/// the debouncer at all. Grounded on the `notify`-wrapping watcher from the
/// example pack's file-watch utility crate, simplified since the
/// debounce/batch logic itself already lives in `WatchDebouncer`.
pub struct FsWatcher {
    _watcher: RecommendedWatcher,
}

impl FsWatcher {
    pub fn start(root: &Path, filter: Arc<PathFilter>) -> Result<(Self, mpsc::UnboundedReceiver<RawChange>), IndexError> {
        let (raw_tx, mut raw_rx) = mpsc::unbounded_channel::<notify::Result<notify::Event>>();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = raw_tx.send(res);
        })
        .map_err(|e| IndexError::internal(format!("failed to create filesystem watcher: {}", e)))?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(|e| IndexError::internal(format!("failed to watch {}: {}", root.display(), e)))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let root_owned: PathBuf = root.to_path_buf();

        let handle = Handle::try_current()
            .map_err(|_| IndexError::internal("filesystem watcher requires a running Tokio runtime"))?;
        handle.spawn(async move {
            while let Some(res) = raw_rx.recv().await {
                let event = match res {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(error = %e, "filesystem watcher error");
                        continue;
                    }
                };
                let kind = classify(&event.kind);
                for path in event.paths {
                    let Ok(relative) = path.strip_prefix(&root_owned) else {
                        continue;
                    };
                    let is_dir = path.is_dir();
                    if !filter.accept_path(relative, is_dir).unwrap_or(false) {
                        continue;
                    }
                    if is_dir {
                        continue;
                    }
                    let relative_str = relative.to_string_lossy().replace('\\', "/");
                    if tx
                        .send(RawChange {
                            path: relative_str,
                            kind,
                            at: Instant::now(),
                        })
                        .is_err()
                    {
                        return;
                    }
                }
            }
        });

        Ok((Self { _watcher: watcher }, rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn observes_a_new_file_as_created() {
        let dir = tempfile::tempdir().unwrap();
        let filter = Arc::new(PathFilter::new(dir.path(), &[], ".codelens"));
        let (_watcher, mut rx) = FsWatcher::start(dir.path(), filter).unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        fs::write(dir.path().join("new_file.rs"), "fn main() {}").unwrap();

        let change = timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
        assert_eq!(change.path, "new_file.rs");
    }

    #[tokio::test]
    async fn ignores_changes_under_excluded_segments() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("node_modules")).unwrap();
        let filter = Arc::new(PathFilter::new(dir.path(), &[], ".codelens"));
        let (_watcher, mut rx) = FsWatcher::start(dir.path(), filter).unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        fs::write(dir.path().join("node_modules/pkg.js"), "module.exports = {};").unwrap();
        fs::write(dir.path().join("kept.rs"), "fn a() {}").unwrap();

        let change = timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
        assert_eq!(change.path, "kept.rs");
    }
}
