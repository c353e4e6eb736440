use std::sync::Arc;

use crate::application::{FindUsagesUseCase, IndexProjectUseCase, ProjectScanner, SearchEngine, UsageGroup};
use crate::config::Config;
use crate::connector::adapter::{DuckdbStore, ManifestIo, MerkleStore, TreeSitterChunker};
use crate::domain::{Chunk, IndexError};

/// Wires a [`Config`] into the concrete adapters and hands back the two
/// owned use cases the host application drives. No use case is kept as a
/// mutable singleton inside the container itself — `index_use_case()` and
/// `search_use_case()` each build a fresh, independently ownable value from
/// the shared `Arc`-wrapped adapters.
pub struct Container {
    config: Config,
    store: Arc<DuckdbStore>,
    scanner: Arc<dyn ProjectScanner>,
    chunker: Arc<TreeSitterChunker>,
    manifest_repo: Arc<ManifestIo>,
    embedder: Arc<dyn crate::application::EmbeddingProvider>,
}

impl Container {
    pub async fn new(config: Config) -> Result<Self, IndexError> {
        std::fs::create_dir_all(&config.data_dir)?;

        let embedder = config.build_provider()?;
        embedder.initialize().await?;

        let store_path = config.store_path();
        if let Some(dir) = store_path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let store = Arc::new(DuckdbStore::open(&store_path, embedder.dimensions())?);

        let scanner: Arc<dyn ProjectScanner> = Arc::new(MerkleStore::new(config.extensions.clone(), ".codelens"));
        let chunker = Arc::new(TreeSitterChunker::new(
            config.extract_identifier_refs,
            config.extract_string_literals,
        ));
        let manifest_repo = Arc::new(ManifestIo::new(config.data_dir.clone()));

        Ok(Self {
            config,
            store,
            scanner,
            chunker,
            manifest_repo,
            embedder,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn index_use_case(&self) -> IndexProjectUseCase {
        IndexProjectUseCase::new(
            Arc::clone(&self.scanner),
            Arc::clone(&self.chunker) as Arc<dyn crate::application::ChunkerService>,
            Arc::clone(&self.store) as Arc<dyn crate::domain::ChunkStore>,
            Arc::clone(&self.store) as Arc<dyn crate::domain::EmbeddingCacheRepository>,
            Arc::clone(&self.manifest_repo) as Arc<dyn crate::application::ManifestRepository>,
            Arc::clone(&self.embedder),
        )
    }

    pub fn search_use_case(&self) -> SearchEngine {
        SearchEngine::new(
            Arc::clone(&self.store) as Arc<dyn crate::domain::ChunkStore>,
            Arc::clone(&self.embedder),
        )
    }

    pub fn find_usages_use_case(&self) -> FindUsagesUseCase {
        FindUsagesUseCase::new(Arc::clone(&self.store) as Arc<dyn crate::domain::ChunkStore>)
    }

    /// `getSymbol(symbol_id)` from the control surface (spec §6.3) — a
    /// direct store lookup, not a dedicated use case, since it's a single
    /// repository call with no orchestration of its own.
    pub async fn get_symbol(&self, symbol_id: &str) -> Result<Option<Chunk>, IndexError> {
        use crate::domain::ChunkStore;
        self.store.get_chunk(symbol_id).await
    }

    pub async fn find_usages(&self, symbol_name: &str) -> Result<Vec<UsageGroup>, IndexError> {
        self.find_usages_use_case().execute(&self.config.repo_id, symbol_name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbeddingProviderKind;

    fn test_config(data_dir: std::path::PathBuf) -> Config {
        Config {
            repo_id: "repo-1".into(),
            embedding_provider: EmbeddingProviderKind::Mock,
            embedding_model: None,
            embedding_dimensions: Some(16),
            extensions: vec![],
            chunk_max_size: 4096,
            watch: Default::default(),
            api_key_ref: None,
            extract_identifier_refs: false,
            extract_string_literals: false,
            data_dir,
            log_level: "info".into(),
            concurrency: Default::default(),
        }
    }

    #[tokio::test]
    async fn builds_both_use_cases_from_a_mock_config() {
        let dir = tempfile::tempdir().unwrap();
        let container = Container::new(test_config(dir.path().to_path_buf())).await.unwrap();

        let _index_use_case = container.index_use_case();
        let _search_use_case = container.search_use_case();
    }

    #[tokio::test]
    async fn rejects_a_config_naming_an_unsupported_cloud_provider() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path().to_path_buf());
        config.embedding_provider = EmbeddingProviderKind::Openai;

        assert!(matches!(Container::new(config).await, Err(IndexError::ProviderInvalid(_))));
    }
}
