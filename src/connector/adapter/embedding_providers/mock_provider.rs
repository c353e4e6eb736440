use async_trait::async_trait;
use rand::Rng;
use rand::SeedableRng;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tracing::debug;

use crate::application::EmbeddingProvider;
use crate::domain::IndexError;

const DEFAULT_DIMENSIONS: usize = 384;

/// Deterministic hash-seeded vectors. Used as the default provider and in
/// tests — no model download, no network (spec §4.5).
pub struct MockEmbeddingProvider {
    dimensions: usize,
    name: String,
}

impl MockEmbeddingProvider {
    pub fn new() -> Self {
        Self::with_dimensions(DEFAULT_DIMENSIONS)
    }

    pub fn with_dimensions(dimensions: usize) -> Self {
        Self {
            dimensions,
            name: "mock-embedding".to_string(),
        }
    }

    fn generate(&self, text: &str) -> Vec<f32> {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let seed = hasher.finish();

        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        let mut vector: Vec<f32> = (0..self.dimensions).map(|_| rng.gen_range(-1.0..1.0)).collect();

        let magnitude: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for x in &mut vector {
                *x /= magnitude;
            }
        }
        vector
    }
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn initialize(&self) -> Result<(), IndexError> {
        Ok(())
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IndexError> {
        let vectors = texts.iter().map(|t| self.generate(t)).collect();
        debug!(count = texts.len(), "generated mock embeddings");
        Ok(vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_text_yields_same_vector() {
        let provider = MockEmbeddingProvider::new();
        let a = provider.embed(&["hello world".to_string()]).await.unwrap();
        let b = provider.embed(&["hello world".to_string()]).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn respects_configured_dimensions() {
        let provider = MockEmbeddingProvider::with_dimensions(128);
        let v = provider.embed(&["test".to_string()]).await.unwrap();
        assert_eq!(v[0].len(), 128);
    }

    #[tokio::test]
    async fn vectors_are_normalized() {
        let provider = MockEmbeddingProvider::new();
        let v = provider.embed(&["test".to_string()]).await.unwrap();
        let magnitude: f32 = v[0].iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 0.001);
    }

    #[tokio::test]
    async fn preserves_input_order() {
        let provider = MockEmbeddingProvider::new();
        let texts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let vectors = provider.embed(&texts).await.unwrap();
        assert_eq!(vectors.len(), 3);
        assert_eq!(vectors[0], provider.generate("a"));
        assert_eq!(vectors[2], provider.generate("c"));
    }
}
