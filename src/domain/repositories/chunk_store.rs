use std::collections::HashSet;

use async_trait::async_trait;

use crate::domain::{Chunk, FileRow, IndexError, Ref, SearchHit, SearchOptions};

/// The persistent vector+FTS store for chunks, files, and refs (spec §4.7).
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Merge on `id`: update-all-on-match, insert-on-miss.
    async fn upsert_chunks(&self, rows: &[Chunk]) -> Result<(), IndexError>;

    /// Append-only fast path, used immediately after `reset_chunks()`.
    async fn add_chunks(&self, rows: &[Chunk]) -> Result<(), IndexError>;

    /// Drops and recreates the chunks table (used for the dimension
    /// mismatch protocol and for a forced full reindex).
    async fn reset_chunks(&self) -> Result<(), IndexError>;

    async fn upsert_files(&self, rows: &[FileRow]) -> Result<(), IndexError>;

    async fn upsert_refs(&self, rows: &[Ref]) -> Result<(), IndexError>;

    /// Returns the number of rows deleted.
    async fn delete_by_filepath(&self, repo_id: &str, file_path: &str) -> Result<u64, IndexError>;

    async fn delete_by_filepaths(&self, repo_id: &str, file_paths: &[String]) -> Result<u64, IndexError>;

    async fn delete_refs_by_filepath(&self, repo_id: &str, file_path: &str) -> Result<u64, IndexError>;

    async fn get_all_filepaths(&self, repo_id: &str) -> Result<HashSet<String>, IndexError>;

    async fn get_chunk(&self, symbol_id: &str) -> Result<Option<Chunk>, IndexError>;

    async fn find_refs_by_token(&self, repo_id: &str, symbol_name: &str) -> Result<Vec<Ref>, IndexError>;

    async fn find_by_symbol_name(&self, repo_id: &str, symbol_name: &str) -> Result<Vec<Chunk>, IndexError>;

    async fn vector_search(
        &self,
        repo_id: &str,
        query_vec: &[f32],
        options: &SearchOptions,
    ) -> Result<Vec<SearchHit>, IndexError>;

    async fn fts_search(
        &self,
        repo_id: &str,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchHit>, IndexError>;

    async fn count_chunks(&self, repo_id: &str) -> Result<u64, IndexError>;

    /// The dimensionality currently configured for the `vector` column,
    /// used by the dimension-mismatch protocol (spec §4.7).
    fn configured_dimensions(&self) -> usize;
}
