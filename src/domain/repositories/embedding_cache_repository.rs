use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::{EmbeddingCacheRow, IndexError};

/// Content-hash keyed embedding cache (spec §4.4).
#[async_trait]
pub trait EmbeddingCacheRepository: Send + Sync {
    /// Bulk-fetches every cached row whose `input_hash` is in `hashes`.
    /// Misses are simply absent from the returned map.
    async fn get_many(&self, hashes: &[String]) -> Result<HashMap<String, EmbeddingCacheRow>, IndexError>;

    /// Upserts by `input_hash`.
    async fn upsert_many(&self, rows: &[EmbeddingCacheRow]) -> Result<(), IndexError>;

    /// Drops and recreates the cache table (dimension-mismatch protocol).
    async fn reset(&self) -> Result<(), IndexError>;
}
