use async_trait::async_trait;

use crate::domain::IndexError;

/// A source of vector embeddings for code and queries (spec §4.5).
///
/// Implementations classify failures into the `IndexError::Provider*`
/// variants so callers (the batch pipeline) can decide whether to retry.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Dimensionality of the vectors this provider returns. Must be stable
    /// for the lifetime of the provider instance.
    fn dimensions(&self) -> usize;

    /// A short identifier used in logs and in the embedding cache's
    /// dimension-mismatch diagnostics.
    fn name(&self) -> &str;

    /// Performs whatever one-time setup the provider needs (loading a
    /// model, warming a connection). Called once before the first `embed`.
    async fn initialize(&self) -> Result<(), IndexError>;

    /// Embeds a batch of texts, preserving order and length.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IndexError>;
}
