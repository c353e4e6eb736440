use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::application::use_cases::batch_pipeline::{BatchPipeline, EmbedBatch};
use crate::application::{ChunkerService, EmbeddingProvider, ManifestRepository, ProjectScanner};
use crate::domain::{
    diff as merkle_diff, BatchFailure, Chunk, ChunkStore, EmbeddingCacheRepository, EmbeddingCacheRow,
    FileRow, IndexError, IndexState, IndexStats, Manifest, ManifestStats, ProgressEvent, Ref, Status,
    WatcherState,
};

/// Orchestrates one indexing run end to end: scan, diff against the last
/// manifest, parse changed files, embed what isn't already cached, persist,
/// and write the updated manifest (spec §4.8).
pub struct IndexProjectUseCase {
    scanner: Arc<dyn ProjectScanner>,
    chunker: Arc<dyn ChunkerService>,
    store: Arc<dyn ChunkStore>,
    cache: Arc<dyn EmbeddingCacheRepository>,
    manifest_repo: Arc<dyn ManifestRepository>,
    embedder: Arc<dyn EmbeddingProvider>,
    pipeline: BatchPipeline,
    progress: broadcast::Sender<ProgressEvent>,
    last_progress: Mutex<Option<ProgressEvent>>,
    last_failures: Mutex<Vec<BatchFailure>>,
}

impl IndexProjectUseCase {
    pub fn new(
        scanner: Arc<dyn ProjectScanner>,
        chunker: Arc<dyn ChunkerService>,
        store: Arc<dyn ChunkStore>,
        cache: Arc<dyn EmbeddingCacheRepository>,
        manifest_repo: Arc<dyn ManifestRepository>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        let (progress, _) = broadcast::channel(64);
        let pipeline = BatchPipeline::new(Arc::clone(&embedder));
        Self {
            scanner,
            chunker,
            store,
            cache,
            manifest_repo,
            embedder,
            pipeline,
            progress,
            last_progress: Mutex::new(None),
            last_failures: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.progress.subscribe()
    }

    fn emit(&self, stage: IndexState, current: u64, total: u64, chunks_processed: u64) {
        let event = ProgressEvent {
            current,
            total,
            stage,
            chunks_processed,
            throttle_message: None,
        };
        *self.last_progress.lock().unwrap() = Some(event.clone());
        let _ = self.progress.send(event);
    }

    /// Polling snapshot for clients that don't want to hold a progress
    /// subscriber open (spec §6.3 `status()`).
    pub fn status(&self, repo_id: &str) -> Result<Status, IndexError> {
        let manifest = self.manifest_repo.load(repo_id)?;
        let last_progress = self.last_progress.lock().unwrap().clone();
        let indexing = match &last_progress {
            Some(event) if !matches!(event.stage, IndexState::Complete | IndexState::Error) => last_progress,
            _ => None,
        };
        Ok(Status {
            initialized: true,
            indexed: manifest.is_some(),
            warmup: false,
            watcher: WatcherState::Disabled,
            indexing,
            slots: Vec::new(),
            failures: self.last_failures.lock().unwrap().clone(),
        })
    }

    /// Whether the on-disk manifest (if any) predates this core's schema
    /// version — `execute()` forces a full reindex in this case regardless,
    /// but callers that want to surface exit code 2 (spec §6.3) check this
    /// first rather than parsing the completed run's outcome.
    pub fn manifest_needs_reindex(&self, repo_id: &str) -> Result<bool, IndexError> {
        Ok(self
            .manifest_repo
            .load(repo_id)?
            .is_some_and(|m| !m.is_current_schema()))
    }

    pub async fn execute(
        &self,
        repo_id: &str,
        revision: &str,
        root: &Path,
        cancel: CancellationToken,
    ) -> Result<(IndexStats, Vec<BatchFailure>), IndexError> {
        let start = Instant::now();
        let mut stats = IndexStats::default();

        self.emit(IndexState::Scanning, 0, 0, 0);
        let previous = self.manifest_repo.load(repo_id)?;
        let forced_reindex = previous.as_ref().is_some_and(|m| !m.is_current_schema());
        if forced_reindex {
            warn!(repo_id, "manifest schema version is stale, forcing full reindex");
        }
        let tree_root = self.scanner.scan(root)?;
        let diff_base = if forced_reindex { None } else { previous.as_ref() };
        let changeset = merkle_diff(diff_base.map(|m| &m.tree_root), Some(&tree_root));

        info!(
            added = changeset.added.len(),
            modified = changeset.modified.len(),
            deleted = changeset.deleted.len(),
            "merkle diff computed"
        );

        if cancel.is_cancelled() {
            return Err(IndexError::Cancelled);
        }

        // Deleted files: drop their chunks and refs outright.
        if !changeset.deleted.is_empty() {
            self.store.delete_by_filepaths(repo_id, &changeset.deleted).await?;
            for path in &changeset.deleted {
                self.store.delete_refs_by_filepath(repo_id, path).await?;
            }
            stats.files_deleted = changeset.deleted.len() as u64;
        }

        // Modified files are re-parsed from scratch: drop the old chunks and
        // refs before inserting the fresh ones, since a symbol may have been
        // renamed or removed entirely within the file.
        for path in &changeset.modified {
            stats.chunks_deleted += self.store.delete_by_filepath(repo_id, path).await?;
            self.store.delete_refs_by_filepath(repo_id, path).await?;
        }

        let changed: Vec<&str> = changeset
            .added
            .iter()
            .chain(changeset.modified.iter())
            .map(String::as_str)
            .collect();
        let total_changed = changed.len() as u64;
        self.emit(IndexState::Chunking, 0, total_changed, 0);

        let mut all_chunks: Vec<Chunk> = Vec::new();
        let mut file_rows: Vec<FileRow> = Vec::new();
        let mut all_refs: Vec<Ref> = Vec::new();

        for (i, path) in changed.iter().copied().enumerate() {
            if cancel.is_cancelled() {
                return Err(IndexError::Cancelled);
            }
            let content = match self.scanner.read_file(root, path) {
                Ok(c) => c,
                Err(e) => {
                    warn!(file = %path, error = %e, "skipping unreadable file");
                    continue;
                }
            };
            if !self.chunker.supports_language(crate::domain::Language::from_path(Path::new(path))) {
                continue;
            }
            let parsed = match self.chunker.parse_file(repo_id, revision, path, &content) {
                Ok(p) => p,
                Err(e) => {
                    warn!(file = %path, error = %e, "skipping unparseable file");
                    continue;
                }
            };

            if changeset.added.iter().any(|p| p.as_str() == path) {
                stats.files_new += 1;
            } else {
                stats.files_modified += 1;
            }
            stats.chunks_added += parsed.chunks.len() as u64;
            file_rows.push(parsed.file_row);
            all_chunks.extend(parsed.chunks);
            all_refs.extend(parsed.refs);

            self.emit(IndexState::Chunking, (i + 1) as u64, total_changed, all_chunks.len() as u64);
        }
        stats.files_scanned = total_changed + stats.files_deleted;

        self.emit(IndexState::Embedding, 0, all_chunks.len() as u64, 0);
        let (embedded_chunks, cache_writes, failures) = self.resolve_embeddings(all_chunks, &cancel).await;
        stats.embeddings_cached += (embedded_chunks.len() as u64).saturating_sub(cache_writes.len() as u64);
        stats.embeddings_computed += cache_writes.len() as u64;

        if !cache_writes.is_empty() {
            self.cache.upsert_many(&cache_writes).await?;
        }
        if !embedded_chunks.is_empty() {
            self.store.upsert_chunks(&embedded_chunks).await?;
        }
        if !file_rows.is_empty() {
            self.store.upsert_files(&file_rows).await?;
        }
        if !all_refs.is_empty() {
            self.store.upsert_refs(&all_refs).await?;
        }

        let now = chrono::Utc::now().timestamp();
        let manifest_stats = compute_manifest_stats(&self.store, repo_id, &stats).await?;
        let new_manifest = match previous {
            Some(mut m) => {
                m.schema_version = crate::domain::CURRENT_SCHEMA_VERSION;
                m.tree_root = tree_root;
                m.revision = revision.to_string();
                m.stats = manifest_stats;
                m.touch(now);
                m
            }
            None => Manifest::new(repo_id, revision, tree_root, now).with_stats(manifest_stats),
        };
        self.manifest_repo.save(&new_manifest)?;
        *self.last_failures.lock().unwrap() = failures.clone();

        self.emit(IndexState::Complete, total_changed, total_changed, embedded_chunks_len(&stats));
        info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            files_new = stats.files_new,
            files_modified = stats.files_modified,
            files_deleted = stats.files_deleted,
            failures = failures.len(),
            "indexing run complete"
        );

        Ok((stats, failures))
    }

    /// Splits `chunks` into already-cached (by content hash) and uncached,
    /// embeds the uncached ones through the batch pipeline, and returns the
    /// full set of chunks with vectors attached plus the cache rows to
    /// persist (spec §4.4 "embedding cache").
    async fn resolve_embeddings(
        &self,
        chunks: Vec<Chunk>,
        cancel: &CancellationToken,
    ) -> (Vec<Chunk>, Vec<EmbeddingCacheRow>, Vec<BatchFailure>) {
        if chunks.is_empty() {
            return (Vec::new(), Vec::new(), Vec::new());
        }

        let hashes: Vec<String> = chunks.iter().map(|c| c.content_hash().to_string()).collect();
        let cached = match self.cache.get_many(&hashes).await {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "embedding cache lookup failed, treating all chunks as uncached");
                HashMap::new()
            }
        };

        let dims = self.embedder.dimensions();
        let mut resolved = Vec::with_capacity(chunks.len());
        let mut by_file: HashMap<String, Vec<Chunk>> = HashMap::new();

        for chunk in chunks {
            match cached.get(chunk.content_hash()) {
                Some(row) if row.matches_dimensions(dims) => {
                    resolved.push(chunk.with_vector(row.vector().to_vec()));
                }
                _ => {
                    by_file.entry(chunk.file_path().to_string()).or_default().push(chunk);
                }
            }
        }

        if by_file.is_empty() {
            return (resolved, Vec::new(), Vec::new());
        }

        let batches: Vec<EmbedBatch> = by_file
            .iter()
            .map(|(file, group)| EmbedBatch {
                batch_info: file.clone(),
                files: vec![file.clone()],
                texts: group.iter().map(|c| c.search_text().to_string()).collect(),
            })
            .collect();

        let (outcomes, failures) = self.pipeline.run(batches, cancel.clone()).await;

        let mut cache_rows = Vec::new();
        for outcome in outcomes {
            let Some(group) = by_file.remove(&outcome.batch_info) else {
                continue;
            };
            let now = chrono::Utc::now().timestamp();
            for (chunk, vector) in group.into_iter().zip(outcome.vectors.into_iter()) {
                cache_rows.push(EmbeddingCacheRow::new(chunk.content_hash().to_string(), vector.clone(), now));
                resolved.push(chunk.with_vector(vector));
            }
        }

        // Failed batches still contribute their chunks for FTS recall,
        // just without a vector.
        for failure in &failures {
            if let Some(group) = by_file.remove(&failure.batch_info) {
                resolved.extend(group);
            }
        }

        (resolved, cache_rows, failures)
    }
}

async fn compute_manifest_stats(
    store: &Arc<dyn ChunkStore>,
    repo_id: &str,
    run_stats: &IndexStats,
) -> Result<ManifestStats, IndexError> {
    let chunks = store.count_chunks(repo_id).await?;
    Ok(ManifestStats {
        files: run_stats.files_new + run_stats.files_modified,
        symbols: chunks,
        chunks,
        refs: 0,
    })
}

fn embedded_chunks_len(stats: &IndexStats) -> u64 {
    stats.embeddings_cached + stats.embeddings_computed
}
