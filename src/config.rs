use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::application::EmbeddingProvider;
use crate::connector::adapter::embedding_providers::{LocalOnnxProvider, MockEmbeddingProvider};
use crate::domain::IndexError;

/// Which capability implementation backs embedding generation (spec §6.2
/// `embeddingProvider`). Cloud kinds name the capability the host
/// application must supply; this crate never speaks their wire protocol
/// directly (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProviderKind {
    Local,
    Gemini,
    Mistral,
    Openai,
    Mock,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyRef {
    pub provider: String,
    pub key_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchConfig {
    pub enabled: bool,
    pub debounce_ms: u64,
    pub batch_window_ms: u64,
    pub await_write_finish: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            debounce_ms: 300,
            batch_window_ms: 5_000,
            await_write_finish: true,
        }
    }
}

impl WatchConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn batch_window(&self) -> Duration {
        Duration::from_millis(self.batch_window_ms)
    }
}

/// Concurrency knobs not named by spec.md but required to run the batch
/// pipeline (spec §4.6, §9 resolved open question: 5 slots).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConcurrencyConfig {
    pub batch_pipeline_slots: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self { batch_pipeline_slots: 5 }
    }
}

/// Per-project configuration (spec §6.2), plus the ambient infrastructure
/// knobs any running instance needs: `data_dir`, `log_level`, and
/// `concurrency`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Config {
    pub repo_id: String,
    pub embedding_provider: EmbeddingProviderKind,
    pub embedding_model: Option<String>,
    pub embedding_dimensions: Option<usize>,
    #[serde(default)]
    pub extensions: Vec<String>,
    #[serde(default = "default_chunk_max_size")]
    pub chunk_max_size: usize,
    #[serde(default)]
    pub watch: WatchConfig,
    pub api_key_ref: Option<ApiKeyRef>,
    #[serde(default)]
    pub extract_identifier_refs: bool,
    #[serde(default)]
    pub extract_string_literals: bool,
    pub data_dir: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,
}

fn default_chunk_max_size() -> usize {
    4096
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("store").join("chunks.duckdb")
    }

    /// Builds the `EmbeddingProvider` this config names (spec §4.5). Cloud
    /// kinds are never constructed here — the host must pass its own
    /// provider instance through a different path if it wants one of them;
    /// asking this crate to build one is always rejected.
    pub fn build_provider(&self) -> Result<Arc<dyn EmbeddingProvider>, IndexError> {
        match self.embedding_provider {
            EmbeddingProviderKind::Mock => Ok(Arc::new(match self.embedding_dimensions {
                Some(dims) => MockEmbeddingProvider::with_dimensions(dims),
                None => MockEmbeddingProvider::new(),
            })),
            EmbeddingProviderKind::Local => {
                let provider = LocalOnnxProvider::new(self.embedding_model.as_deref())?;
                Ok(Arc::new(provider))
            }
            EmbeddingProviderKind::Gemini | EmbeddingProviderKind::Mistral | EmbeddingProviderKind::Openai => {
                Err(IndexError::ProviderInvalid(format!(
                    "{:?} requires the host application to supply an EmbeddingProvider; codelens does not speak its wire protocol",
                    self.embedding_provider
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_json(provider: &str) -> String {
        format!(
            r#"{{
                "repoId": "repo-1",
                "embeddingProvider": "{}",
                "embeddingModel": null,
                "embeddingDimensions": null,
                "apiKeyRef": null,
                "dataDir": "/tmp/codelens"
            }}"#,
            provider
        )
    }

    #[test]
    fn parses_minimal_config_with_defaults() {
        let config = Config::from_json(&minimal_json("mock")).unwrap();
        assert_eq!(config.chunk_max_size, 4096);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.concurrency.batch_pipeline_slots, 5);
        assert!(!config.watch.enabled);
    }

    #[test]
    fn rejects_unknown_fields() {
        let json = r#"{
            "repoId": "repo-1", "embeddingProvider": "mock", "embeddingModel": null,
            "embeddingDimensions": null, "apiKeyRef": null, "dataDir": "/tmp/codelens",
            "unexpectedField": true
        }"#;
        assert!(Config::from_json(json).is_err());
    }

    #[test]
    fn cloud_providers_are_rejected_without_a_host_supplied_client() {
        let config = Config::from_json(&minimal_json("openai")).unwrap();
        assert!(matches!(config.build_provider(), Err(IndexError::ProviderInvalid(_))));
    }

    #[test]
    fn mock_provider_builds_with_configured_dimensions() {
        let mut config = Config::from_json(&minimal_json("mock")).unwrap();
        config.embedding_dimensions = Some(128);
        let provider = config.build_provider().unwrap();
        assert_eq!(provider.dimensions(), 128);
    }
}
