use std::collections::HashMap;

use crate::domain::{SearchDebugInfo, SearchHit};

/// Smoothing constant for Reciprocal Rank Fusion.
pub const RRF_K: f32 = 60.0;

/// Below this top vector score, semantic retrieval is considered weak and
/// the BM25 leg is upweighted in the fused ranking (spec §4.9 step 3).
pub const WEAK_VECTOR_THRESHOLD: f32 = 0.3;

/// Default lexical weight (spec §4.9 step 2): vector leg gets the rest.
pub const DEFAULT_BM25_WEIGHT: f32 = 0.3;

/// Ceiling the auto-boost interpolates toward as the vector leg gets weaker.
pub const MAX_BM25_WEIGHT: f32 = 0.9;

pub struct FusionResult {
    pub hits: Vec<SearchHit>,
    pub debug: SearchDebugInfo,
}

/// Reciprocal Rank Fusion between a vector-similarity ranking and a BM25
/// ranking (spec §4.9 steps 2-5): `score = w_vec/(K+rank_vec) +
/// w_bm25/(K+rank_bm25)` with default `w_bm25 = 0.3`, `w_vec = 0.7`. When the
/// vector leg's own top score falls below [`WEAK_VECTOR_THRESHOLD`] — the
/// embedding found nothing it's confident about — `w_bm25` is interpolated
/// linearly toward [`MAX_BM25_WEIGHT`] in proportion to how far below the
/// threshold the top vector score sits, and the caller is told to re-fetch
/// candidates at a wider oversample multiplier. Ties break on higher vector
/// score, then lower line number, then file path.
pub fn rrf_fuse(vector: Vec<SearchHit>, fts: Vec<SearchHit>, limit: usize) -> FusionResult {
    let max_vector_score = vector.iter().map(|h| h.score).fold(0.0_f32, f32::max);
    let auto_boost_applied = !vector.is_empty() && max_vector_score < WEAK_VECTOR_THRESHOLD;
    let bm25_weight = if auto_boost_applied {
        let weakness = ((WEAK_VECTOR_THRESHOLD - max_vector_score) / WEAK_VECTOR_THRESHOLD).clamp(0.0, 1.0);
        DEFAULT_BM25_WEIGHT + (MAX_BM25_WEIGHT - DEFAULT_BM25_WEIGHT) * weakness
    } else {
        DEFAULT_BM25_WEIGHT
    };
    let vector_weight = 1.0 - bm25_weight;
    let oversample_multiplier = if auto_boost_applied { 4.0 } else { 2.0 };

    let mut merged: HashMap<String, SearchHit> = HashMap::new();
    let mut rrf_scores: HashMap<String, f32> = HashMap::new();

    for (rank, hit) in vector.into_iter().enumerate() {
        let rrf = vector_weight / (RRF_K + (rank + 1) as f32);
        *rrf_scores.entry(hit.id.clone()).or_insert(0.0) += rrf;
        let vscore = hit.score;
        merged
            .entry(hit.id.clone())
            .and_modify(|existing| existing.vector_score = Some(vscore))
            .or_insert_with(|| {
                let mut h = hit;
                h.vector_score = Some(vscore);
                h
            });
    }

    for (rank, hit) in fts.into_iter().enumerate() {
        let rrf = bm25_weight / (RRF_K + (rank + 1) as f32);
        *rrf_scores.entry(hit.id.clone()).or_insert(0.0) += rrf;
        let fscore = hit.score;
        merged
            .entry(hit.id.clone())
            .and_modify(|existing| existing.fts_score = Some(fscore))
            .or_insert_with(|| {
                let mut h = hit;
                h.fts_score = Some(fscore);
                h
            });
    }

    let mut hits: Vec<SearchHit> = rrf_scores
        .into_iter()
        .filter_map(|(id, score)| {
            merged.remove(&id).map(|mut h| {
                h.score = score;
                h
            })
        })
        .collect();

    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                let a_vec = a.vector_score.unwrap_or(f32::NEG_INFINITY);
                let b_vec = b.vector_score.unwrap_or(f32::NEG_INFINITY);
                b_vec.partial_cmp(&a_vec).unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| a.start_line.cmp(&b.start_line))
            .then_with(|| a.file_path.cmp(&b.file_path))
    });
    hits.truncate(limit);

    FusionResult {
        hits,
        debug: SearchDebugInfo {
            intent_used: None,
            auto_boost_applied,
            effective_bm25_weight: bm25_weight,
            oversample_multiplier,
            max_vector_score,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: &str, score: f32) -> SearchHit {
        SearchHit {
            id: id.to_string(),
            file_path: "a.rs".to_string(),
            filename: "a.rs".to_string(),
            start_line: 1,
            end_line: 2,
            symbol_name: None,
            symbol_kind: None,
            score,
            vector_score: None,
            fts_score: None,
            signature: None,
            is_exported: false,
        }
    }

    #[test]
    fn strong_vector_leg_uses_base_weight() {
        let vector = vec![hit("a", 0.9), hit("b", 0.5)];
        let fts = vec![hit("b", 12.0), hit("c", 8.0)];
        let result = rrf_fuse(vector, fts, 10);
        assert!(!result.debug.auto_boost_applied);
        assert_eq!(result.debug.effective_bm25_weight, DEFAULT_BM25_WEIGHT);
    }

    #[test]
    fn weak_vector_leg_triggers_boost_proportional_to_weakness() {
        let vector = vec![hit("a", 0.15)];
        let fts = vec![hit("a", 12.0)];
        let result = rrf_fuse(vector, fts, 10);
        assert!(result.debug.auto_boost_applied);
        assert!(result.debug.effective_bm25_weight > DEFAULT_BM25_WEIGHT);
        assert!(result.debug.effective_bm25_weight <= MAX_BM25_WEIGHT);
        assert_eq!(result.debug.oversample_multiplier, 4.0);
    }

    #[test]
    fn zero_vector_score_hits_the_boost_ceiling() {
        let vector = vec![hit("a", 0.0)];
        let fts = vec![hit("a", 12.0)];
        let result = rrf_fuse(vector, fts, 10);
        assert!(result.debug.auto_boost_applied);
        assert_eq!(result.debug.effective_bm25_weight, MAX_BM25_WEIGHT);
    }

    #[test]
    fn ties_break_on_vector_score_then_line_then_path() {
        let mut a = hit("a", 0.0);
        a.file_path = "b.rs".to_string();
        a.start_line = 5;
        a.vector_score = Some(0.5);
        let mut b = hit("b", 0.0);
        b.file_path = "a.rs".to_string();
        b.start_line = 1;
        b.vector_score = Some(0.9);

        let mut merged: HashMap<String, SearchHit> = HashMap::new();
        merged.insert("a".to_string(), a);
        merged.insert("b".to_string(), b);

        let mut hits: Vec<SearchHit> = merged.into_values().collect();
        hits.sort_by(|x, y| {
            x.score
                .partial_cmp(&y.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    let x_vec = x.vector_score.unwrap_or(f32::NEG_INFINITY);
                    let y_vec = y.vector_score.unwrap_or(f32::NEG_INFINITY);
                    y_vec.partial_cmp(&x_vec).unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| x.start_line.cmp(&y.start_line))
                .then_with(|| x.file_path.cmp(&y.file_path))
        });
        assert_eq!(hits[0].id, "b");
    }

    #[test]
    fn empty_vector_leg_does_not_trigger_boost() {
        let result = rrf_fuse(vec![], vec![hit("a", 5.0)], 10);
        assert!(!result.debug.auto_boost_applied);
        assert_eq!(result.debug.max_vector_score, 0.0);
    }

    #[test]
    fn chunk_present_in_both_legs_outranks_single_leg_match() {
        let vector = vec![hit("shared", 0.9), hit("vec-only", 0.8)];
        let fts = vec![hit("shared", 10.0), hit("fts-only", 9.0)];
        let result = rrf_fuse(vector, fts, 10);
        assert_eq!(result.hits[0].id, "shared");
    }

    #[test]
    fn limit_truncates_fused_results() {
        let vector = vec![hit("a", 0.9), hit("b", 0.8), hit("c", 0.7)];
        let result = rrf_fuse(vector, vec![], 2);
        assert_eq!(result.hits.len(), 2);
    }
}
