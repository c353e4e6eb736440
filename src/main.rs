//! Smoke-test binary: wires a [`codelens::Config`] from `CODELENS_CONFIG`
//! (a JSON file path) or a minimal mock-provider default, runs one indexing
//! pass over the given root, and prints the resulting stats. Exit codes
//! follow the control surface (spec §6.3): 0 success, 1 unrecoverable init
//! error, 2 reindex required due to a manifest schema-version mismatch.

use std::path::PathBuf;
use std::process::ExitCode;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use codelens::{Config, Container, IndexError};

fn load_config() -> Result<Config, IndexError> {
    if let Ok(path) = std::env::var("CODELENS_CONFIG") {
        let text = std::fs::read_to_string(&path)?;
        return Config::from_json(&text).map_err(|e| IndexError::invalid_input(e.to_string()));
    }

    let data_dir = std::env::var("CODELENS_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(".codelens"));
    let json = format!(
        r#"{{"repoId":"local","embeddingProvider":"mock","embeddingModel":null,"embeddingDimensions":384,"apiKeyRef":null,"dataDir":{:?}}}"#,
        data_dir
    );
    Config::from_json(&json).map_err(|e| IndexError::invalid_input(e.to_string()))
}

async fn run() -> Result<bool, IndexError> {
    let config = load_config()?;
    let _guard = codelens::init_tracing(&config.data_dir, "codelens", &config.log_level)
        .map_err(|e| IndexError::internal(format!("failed to initialize logging: {}", e)))?;

    let root: PathBuf = std::env::args().nth(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
    info!(root = %root.display(), "starting index run");

    let container = Container::new(config.clone()).await?;
    let index_use_case = container.index_use_case();
    let reindex_forced = index_use_case.manifest_needs_reindex(&config.repo_id)?;

    let revision = uuid::Uuid::new_v4().to_string();
    let (stats, failures) = index_use_case
        .execute(&config.repo_id, &revision, &root, CancellationToken::new())
        .await?;

    info!(?stats, failures = failures.len(), "index run finished");
    for failure in &failures {
        error!(batch = %failure.batch_info, error = %failure.error, "batch failed permanently");
    }

    Ok(reindex_forced)
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(false) => ExitCode::from(0),
        Ok(true) => {
            eprintln!("manifest schema version was stale, forced full reindex");
            ExitCode::from(2)
        }
        Err(e) => {
            eprintln!("codelens failed to run: {}", e);
            ExitCode::from(1)
        }
    }
}
