use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use crate::application::EmbeddingProvider;
use crate::application::use_cases::rrf_fuse::rrf_fuse;
use crate::domain::{
    ChunkStore, IndexError, SearchDebugInfo, SearchHit, SearchIntent, SearchOptions, SearchResults,
};

/// Routes a query to a retrieval strategy and returns ranked hits (spec
/// §4.9). Wraps a [`ChunkStore`] (vector + BM25) and an [`EmbeddingProvider`]
/// (to embed the query text for the vector leg).
pub struct SearchEngine {
    store: Arc<dyn ChunkStore>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl SearchEngine {
    pub fn new(store: Arc<dyn ChunkStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { store, embedder }
    }

    pub async fn search(
        &self,
        repo_id: &str,
        query_text: &str,
        options: SearchOptions,
    ) -> Result<SearchResults, IndexError> {
        let start = Instant::now();
        let intent = Self::resolve_intent(query_text, options.intent);
        debug!(query = query_text, ?intent, "resolved search intent");

        let results = match intent {
            SearchIntent::Definition => self.search_definition(repo_id, query_text, &options).await?,
            SearchIntent::ExactText => self.search_exact_text(repo_id, query_text, &options).await?,
            SearchIntent::Usage => self.search_usage(repo_id, query_text, &options).await?,
            SearchIntent::SimilarCode => self.search_similar_code(repo_id, query_text, &options).await?,
            SearchIntent::Concept | SearchIntent::Auto => {
                self.search_concept(repo_id, query_text, &options).await?
            }
        };

        info!(
            query = query_text,
            ?intent,
            hits = results.hits.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "search complete"
        );
        Ok(results)
    }

    /// When the caller leaves intent as `Auto`, infer a more specific one
    /// from the query's shape (spec §4.9 "Auto routing").
    fn resolve_intent(query_text: &str, requested: SearchIntent) -> SearchIntent {
        if requested != SearchIntent::Auto {
            return requested;
        }
        let trimmed = query_text.trim();
        if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
            return SearchIntent::ExactText;
        }
        if let Some(rest) = Self::strip_usage_phrase(trimmed) {
            if !rest.is_empty() {
                return SearchIntent::Usage;
            }
        }
        if Self::looks_like_identifier(trimmed) {
            return SearchIntent::Definition;
        }
        SearchIntent::Concept
    }

    fn looks_like_identifier(text: &str) -> bool {
        !text.is_empty()
            && !text.contains(char::is_whitespace)
            && text
                .chars()
                .all(|c| c.is_alphanumeric() || c == '_' || c == '.' || c == ':')
    }

    fn strip_usage_phrase(text: &str) -> Option<&str> {
        const PREFIX_PHRASES: &[&str] = &["usage of ", "usages of ", "who calls ", "callers of "];
        let lower = text.to_ascii_lowercase();
        for phrase in PREFIX_PHRASES {
            if lower.starts_with(phrase) {
                return Some(text[phrase.len()..].trim());
            }
        }

        // "where is X used" / "where's X used" / bare "X used".
        let mut rest = text;
        let mut lower_rest = lower.as_str();
        for prefix in ["where is ", "where's "] {
            if lower_rest.starts_with(prefix) {
                rest = &rest[prefix.len()..];
                lower_rest = &lower_rest[prefix.len()..];
                break;
            }
        }
        if lower_rest.ends_with(" used") {
            let end = rest.len() - " used".len();
            if end > 0 {
                return Some(rest[..end].trim());
            }
        }
        None
    }

    async fn search_definition(
        &self,
        repo_id: &str,
        query_text: &str,
        options: &SearchOptions,
    ) -> Result<SearchResults, IndexError> {
        let matches = self.store.find_by_symbol_name(repo_id, query_text.trim()).await?;
        if matches.is_empty() {
            return self.search_concept(repo_id, query_text, options).await;
        }
        let hits: Vec<SearchHit> = matches
            .into_iter()
            .take(options.effective_limit())
            .enumerate()
            .map(|(rank, chunk)| SearchHit {
                id: chunk.symbol_id().to_string(),
                file_path: chunk.file_path().to_string(),
                filename: file_name(chunk.file_path()),
                start_line: chunk.start_line(),
                end_line: chunk.end_line(),
                symbol_name: chunk.symbol_name().map(str::to_string),
                symbol_kind: chunk.symbol_kind(),
                score: 1.0 / (1.0 + rank as f32),
                vector_score: None,
                fts_score: None,
                signature: None,
                is_exported: chunk.is_exported(),
            })
            .collect();
        let total = hits.len();
        Ok(SearchResults {
            hits,
            total_matches: total,
            debug: SearchDebugInfo {
                intent_used: Some(SearchIntent::Definition),
                ..Default::default()
            },
        })
    }

    async fn search_exact_text(
        &self,
        repo_id: &str,
        query_text: &str,
        options: &SearchOptions,
    ) -> Result<SearchResults, IndexError> {
        let needle = query_text.trim().trim_matches('"');
        let hits = self.store.fts_search(repo_id, needle, options).await?;
        let total = hits.len();
        Ok(SearchResults {
            hits,
            total_matches: total,
            debug: SearchDebugInfo {
                intent_used: Some(SearchIntent::ExactText),
                ..Default::default()
            },
        })
    }

    async fn search_usage(
        &self,
        repo_id: &str,
        query_text: &str,
        options: &SearchOptions,
    ) -> Result<SearchResults, IndexError> {
        let symbol_name = Self::strip_usage_phrase(query_text.trim())
            .unwrap_or(query_text.trim())
            .to_string();
        let refs = self.store.find_refs_by_token(repo_id, &symbol_name).await?;
        let hits: Vec<SearchHit> = refs
            .into_iter()
            .take(options.effective_limit())
            .map(|r| SearchHit {
                id: r.ref_id().to_string(),
                file_path: r.file_path().to_string(),
                filename: file_name(r.file_path()),
                start_line: r.start_line(),
                end_line: r.end_line(),
                symbol_name: Some(symbol_name.clone()),
                symbol_kind: None,
                score: 1.0,
                vector_score: None,
                fts_score: None,
                signature: Some(r.context_snippet().to_string()),
                is_exported: false,
            })
            .collect();
        let total = hits.len();
        Ok(SearchResults {
            hits,
            total_matches: total,
            debug: SearchDebugInfo {
                intent_used: Some(SearchIntent::Usage),
                ..Default::default()
            },
        })
    }

    async fn search_similar_code(
        &self,
        repo_id: &str,
        query_text: &str,
        options: &SearchOptions,
    ) -> Result<SearchResults, IndexError> {
        let embedding = self.embed_query(query_text).await?;
        let hits = self.store.vector_search(repo_id, &embedding, options).await?;
        let total = hits.len();
        Ok(SearchResults {
            hits,
            total_matches: total,
            debug: SearchDebugInfo {
                intent_used: Some(SearchIntent::SimilarCode),
                ..Default::default()
            },
        })
    }

    /// Hybrid vector+BM25 retrieval fused with RRF (spec §4.9 step 3).
    async fn search_concept(
        &self,
        repo_id: &str,
        query_text: &str,
        options: &SearchOptions,
    ) -> Result<SearchResults, IndexError> {
        let embedding = self.embed_query(query_text).await?;

        let oversample_options = SearchOptions {
            limit: (options.effective_limit() * 2).max(20),
            ..options.clone()
        };

        let (vector_hits, fts_hits) = tokio::try_join!(
            self.store.vector_search(repo_id, &embedding, &oversample_options),
            self.store.fts_search(repo_id, query_text, &oversample_options),
        )?;

        let mut fusion = rrf_fuse(vector_hits, fts_hits, options.effective_limit());

        // Auto-boost re-fetches the BM25 leg wider; vector recall at 0.3
        // threshold rarely benefits from a second vector fetch since the
        // embedding itself didn't change, but BM25 can surface more lexical
        // matches than the first oversample pulled in.
        if fusion.debug.auto_boost_applied {
            let wide_options = SearchOptions {
                limit: (options.effective_limit() as f32 * fusion.debug.oversample_multiplier) as usize,
                ..options.clone()
            };
            let wide_fts = self.store.fts_search(repo_id, query_text, &wide_options).await?;
            let vector_hits_again = self
                .store
                .vector_search(repo_id, &embedding, &oversample_options)
                .await?;
            fusion = rrf_fuse(vector_hits_again, wide_fts, options.effective_limit());
        }

        fusion.debug.intent_used = Some(SearchIntent::Concept);
        let total = fusion.hits.len();
        Ok(SearchResults {
            hits: fusion.hits,
            total_matches: total,
            debug: fusion.debug,
        })
    }

    async fn embed_query(&self, query_text: &str) -> Result<Vec<f32>, IndexError> {
        let mut vectors = self.embedder.embed(&[query_text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| IndexError::internal("embedding provider returned no vector for query"))
    }
}

fn file_name(path: &str) -> String {
    std::path::Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
        .to_string()
}
