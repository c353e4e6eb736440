use serde::{Deserialize, Serialize};

use super::SymbolKind;

/// Routes a user query to the right retrieval strategy (spec §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchIntent {
    Definition,
    SimilarCode,
    ExactText,
    Usage,
    /// Hybrid vector+BM25 retrieval with RRF fusion; the target of `Auto`
    /// when no more specific intent applies.
    Concept,
    /// Let the router infer the intent from the query shape.
    Auto,
}

/// A predicate over chunk metadata, compiled by the store into its native
/// where-clause form (spec §4.7). Every leaf is bound as a parameter by
/// the store adapter — never string-interpolated — so the filter is safe
/// against injection regardless of user input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Filter {
    PathPrefix(String),
    PathContains(String),
    PathNotContains(String),
    ExtensionIn(Vec<String>),
    SymbolKindIn(Vec<SymbolKind>),
    IsExported(bool),
    HasDocstring(bool),
    DecoratorContains(String),
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

/// Options accompanying a search query (spec §4.9, §6.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOptions {
    pub intent: SearchIntent,
    pub limit: usize,
    pub min_score: Option<f32>,
    pub filter: Option<Filter>,
    /// Exhaustive mode: caps `limit` at 500 and reports `total_matches`.
    pub exhaustive: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            intent: SearchIntent::Auto,
            limit: 10,
            min_score: None,
            filter: None,
            exhaustive: false,
        }
    }
}

impl SearchOptions {
    pub fn effective_limit(&self) -> usize {
        if self.exhaustive {
            500
        } else {
            self.limit.max(1)
        }
    }
}

/// One ranked result row (spec §4.9 "Result rows").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub file_path: String,
    pub filename: String,
    pub start_line: u32,
    pub end_line: u32,
    pub symbol_name: Option<String>,
    pub symbol_kind: Option<SymbolKind>,
    pub score: f32,
    pub vector_score: Option<f32>,
    pub fts_score: Option<f32>,
    pub signature: Option<String>,
    pub is_exported: bool,
}

/// Debug information surfaced alongside hybrid search results (spec §4.9
/// step 3: auto-boost must be observable by the caller).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchDebugInfo {
    pub intent_used: Option<SearchIntent>,
    pub auto_boost_applied: bool,
    pub effective_bm25_weight: f32,
    pub oversample_multiplier: f32,
    pub max_vector_score: f32,
}

impl Default for SearchIntent {
    fn default() -> Self {
        SearchIntent::Auto
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResults {
    pub hits: Vec<SearchHit>,
    pub total_matches: usize,
    pub debug: SearchDebugInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhaustive_mode_caps_limit_at_500() {
        let opts = SearchOptions {
            exhaustive: true,
            limit: 10,
            ..Default::default()
        };
        assert_eq!(opts.effective_limit(), 500);
    }

    #[test]
    fn non_exhaustive_uses_requested_limit() {
        let opts = SearchOptions {
            limit: 25,
            ..Default::default()
        };
        assert_eq!(opts.effective_limit(), 25);
    }

    #[test]
    fn limit_zero_is_raised_to_one() {
        let opts = SearchOptions {
            limit: 0,
            ..Default::default()
        };
        assert_eq!(opts.effective_limit(), 1);
    }
}
