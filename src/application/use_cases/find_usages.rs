use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::{ChunkStore, IndexError, Ref};

/// One file's worth of usages of a symbol, grouped for display (spec §4.9
/// "usage" intent groups hits by file).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageGroup {
    pub file_path: String,
    pub refs: Vec<Ref>,
}

/// Looks up call/import/identifier occurrences of a symbol name (spec §4.3
/// "Reference extraction", §4.9 "usage"). A ref matches when its token
/// equals the symbol name or ends with `.symbol_name` (qualified calls).
pub struct FindUsagesUseCase {
    store: Arc<dyn ChunkStore>,
}

impl FindUsagesUseCase {
    pub fn new(store: Arc<dyn ChunkStore>) -> Self {
        Self { store }
    }

    pub async fn execute(&self, repo_id: &str, symbol_name: &str) -> Result<Vec<UsageGroup>, IndexError> {
        let refs = self.store.find_refs_by_token(repo_id, symbol_name).await?;

        let mut by_file: HashMap<String, Vec<Ref>> = HashMap::new();
        for r in refs {
            by_file.entry(r.file_path().to_string()).or_default().push(r);
        }

        let mut groups: Vec<UsageGroup> = by_file
            .into_iter()
            .map(|(file_path, mut refs)| {
                refs.sort_by_key(|r| r.start_line());
                UsageGroup { file_path, refs }
            })
            .collect();
        groups.sort_by(|a, b| a.file_path.cmp(&b.file_path));
        Ok(groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashSet;

    use crate::domain::{Chunk, FileRow, RefKind, SearchHit, SearchOptions};

    struct FakeStore {
        refs: Vec<Ref>,
    }

    #[async_trait]
    impl ChunkStore for FakeStore {
        async fn upsert_chunks(&self, _rows: &[Chunk]) -> Result<(), IndexError> {
            Ok(())
        }
        async fn add_chunks(&self, _rows: &[Chunk]) -> Result<(), IndexError> {
            Ok(())
        }
        async fn reset_chunks(&self) -> Result<(), IndexError> {
            Ok(())
        }
        async fn upsert_files(&self, _rows: &[FileRow]) -> Result<(), IndexError> {
            Ok(())
        }
        async fn upsert_refs(&self, _rows: &[Ref]) -> Result<(), IndexError> {
            Ok(())
        }
        async fn delete_by_filepath(&self, _repo_id: &str, _file_path: &str) -> Result<u64, IndexError> {
            Ok(0)
        }
        async fn delete_by_filepaths(&self, _repo_id: &str, _file_paths: &[String]) -> Result<u64, IndexError> {
            Ok(0)
        }
        async fn delete_refs_by_filepath(&self, _repo_id: &str, _file_path: &str) -> Result<u64, IndexError> {
            Ok(0)
        }
        async fn get_all_filepaths(&self, _repo_id: &str) -> Result<HashSet<String>, IndexError> {
            Ok(HashSet::new())
        }
        async fn get_chunk(&self, _symbol_id: &str) -> Result<Option<Chunk>, IndexError> {
            Ok(None)
        }
        async fn find_refs_by_token(&self, _repo_id: &str, symbol_name: &str) -> Result<Vec<Ref>, IndexError> {
            Ok(self
                .refs
                .iter()
                .filter(|r| r.matches_symbol(symbol_name))
                .cloned()
                .collect())
        }
        async fn find_by_symbol_name(&self, _repo_id: &str, _symbol_name: &str) -> Result<Vec<Chunk>, IndexError> {
            Ok(vec![])
        }
        async fn vector_search(
            &self,
            _repo_id: &str,
            _query_vec: &[f32],
            _options: &SearchOptions,
        ) -> Result<Vec<SearchHit>, IndexError> {
            Ok(vec![])
        }
        async fn fts_search(
            &self,
            _repo_id: &str,
            _query: &str,
            _options: &SearchOptions,
        ) -> Result<Vec<SearchHit>, IndexError> {
            Ok(vec![])
        }
        async fn count_chunks(&self, _repo_id: &str) -> Result<u64, IndexError> {
            Ok(0)
        }
        fn configured_dimensions(&self) -> usize {
            384
        }
    }

    #[tokio::test]
    async fn groups_usages_by_file_sorted_by_line() {
        let refs = vec![
            Ref::new("r", "v", "b.rs", 10, 10, RefKind::Call, "login", "ctx"),
            Ref::new("r", "v", "a.rs", 5, 5, RefKind::Call, "auth.login", "ctx"),
            Ref::new("r", "v", "a.rs", 2, 2, RefKind::Call, "login", "ctx"),
        ];
        let use_case = FindUsagesUseCase::new(Arc::new(FakeStore { refs }));
        let groups = use_case.execute("r", "login").await.unwrap();

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].file_path, "a.rs");
        assert_eq!(groups[0].refs[0].start_line(), 2);
        assert_eq!(groups[0].refs[1].start_line(), 5);
        assert_eq!(groups[1].file_path, "b.rs");
    }
}
