use serde::{Deserialize, Serialize};

/// A cached embedding vector, keyed by the content hash of the chunk it
/// was computed for (spec §3 "EmbeddingCacheRow", §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingCacheRow {
    input_hash: String,
    vector: Vec<f32>,
    created_at: i64,
}

impl EmbeddingCacheRow {
    pub fn new(input_hash: impl Into<String>, vector: Vec<f32>, created_at: i64) -> Self {
        Self {
            input_hash: input_hash.into(),
            vector,
            created_at,
        }
    }

    pub fn input_hash(&self) -> &str {
        &self.input_hash
    }

    pub fn vector(&self) -> &[f32] {
        &self.vector
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    /// The cache MUST be dropped and recreated when a stored vector's
    /// length disagrees with the provider's declared dimensionality
    /// (spec §4.4 invariant, §4.7 dimension-mismatch protocol).
    pub fn matches_dimensions(&self, expected: usize) -> bool {
        self.vector.len() == expected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_dimension_mismatch() {
        let row = EmbeddingCacheRow::new("hash1", vec![0.0; 384], 0);
        assert!(row.matches_dimensions(384));
        assert!(!row.matches_dimensions(768));
    }
}
