//! End-to-end scenarios exercising the full `Container` → use-case wiring
//! against a mock embedding provider and a temporary DuckDB file.

use std::fs;

use codelens::{Config, Container, EmbeddingProviderKind, SearchIntent, SearchOptions};
use tokio_util::sync::CancellationToken;

fn write_project(root: &std::path::Path) {
    fs::create_dir_all(root.join("src/api")).unwrap();
    fs::write(
        root.join("src/api/endpoints.ts"),
        "export async function getUser(id) {\n  return db.users.find(id);\n}\n",
    )
    .unwrap();
    fs::write(root.join("math.py"), "def add_two_numbers(a, b):\n    return a + b\n").unwrap();
}

fn test_config(data_dir: std::path::PathBuf) -> Config {
    Config {
        repo_id: "repo-1".into(),
        embedding_provider: EmbeddingProviderKind::Mock,
        embedding_model: None,
        embedding_dimensions: Some(32),
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
async fn fresh_index_then_definition_search_finds_the_ts_function() {
    let project_dir = tempfile::tempdir().unwrap();
    let data_dir = tempfile::tempdir().unwrap();
    write_project(project_dir.path());

    let container = Container::new(test_config(data_dir.path().to_path_buf())).await.unwrap();
    let index_use_case = container.index_use_case();
    let (stats, failures) = index_use_case
        .execute("repo-1", "rev-1", project_dir.path(), CancellationToken::new())
        .await
        .unwrap();
    assert!(failures.is_empty());
    assert_eq!(stats.files_new, 2);

    let search_engine = container.search_use_case();
    let results = search_engine
        .search(
            "repo-1",
            "getUser",
            SearchOptions {
                intent: SearchIntent::Definition,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(!results.hits.is_empty());
    let hit = &results.hits[0];
    assert_eq!(hit.file_path, "src/api/endpoints.ts");
    assert!(hit.is_exported);
}

#[tokio::test]
async fn reindexing_unchanged_tree_adds_nothing_and_reads_the_embedding_cache() {
    let project_dir = tempfile::tempdir().unwrap();
    let data_dir = tempfile::tempdir().unwrap();
    write_project(project_dir.path());

    let container = Container::new(test_config(data_dir.path().to_path_buf())).await.unwrap();
    let index_use_case = container.index_use_case();

    index_use_case
        .execute("repo-1", "rev-1", project_dir.path(), CancellationToken::new())
        .await
        .unwrap();

    let (stats, failures) = index_use_case
        .execute("repo-1", "rev-2", project_dir.path(), CancellationToken::new())
        .await
        .unwrap();

    assert!(failures.is_empty());
    assert_eq!(stats.chunks_added, 0);
    assert_eq!(stats.chunks_deleted, 0);
    assert_eq!(stats.embeddings_computed, 0);
}

#[tokio::test]
async fn deleting_a_file_then_restoring_identical_bytes_hits_the_embedding_cache() {
    let project_dir = tempfile::tempdir().unwrap();
    let data_dir = tempfile::tempdir().unwrap();
    write_project(project_dir.path());

    let container = Container::new(test_config(data_dir.path().to_path_buf())).await.unwrap();
    let index_use_case = container.index_use_case();
    index_use_case
        .execute("repo-1", "rev-1", project_dir.path(), CancellationToken::new())
        .await
        .unwrap();

    let py_path = project_dir.path().join("math.py");
    let original = fs::read_to_string(&py_path).unwrap();
    fs::remove_file(&py_path).unwrap();
    index_use_case
        .execute("repo-1", "rev-2", project_dir.path(), CancellationToken::new())
        .await
        .unwrap();

    fs::write(&py_path, &original).unwrap();
    let (stats, failures) = index_use_case
        .execute("repo-1", "rev-3", project_dir.path(), CancellationToken::new())
        .await
        .unwrap();

    assert!(failures.is_empty());
    assert_eq!(stats.embeddings_computed, 0);
}

#[tokio::test]
async fn usage_query_routes_to_usage_intent_and_returns_import_sites() {
    let project_dir = tempfile::tempdir().unwrap();
    let data_dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(project_dir.path().join("src")).unwrap();
    fs::write(
        project_dir.path().join("src/auth.ts"),
        "export function login(user) {\n  return user;\n}\n",
    )
    .unwrap();
    fs::write(
        project_dir.path().join("src/app.ts"),
        "import { login } from './auth';\n\nlogin('alice');\n",
    )
    .unwrap();

    let container = Container::new(test_config(data_dir.path().to_path_buf())).await.unwrap();
    let index_use_case = container.index_use_case();
    index_use_case
        .execute("repo-1", "rev-1", project_dir.path(), CancellationToken::new())
        .await
        .unwrap();

    let search_engine = container.search_use_case();
    let results = search_engine
        .search("repo-1", "where is login used", SearchOptions::default())
        .await
        .unwrap();

    assert_eq!(results.debug.intent_used, Some(SearchIntent::Usage));
    assert!(results.hits.iter().any(|h| h.file_path == "src/app.ts"));
}

#[tokio::test]
async fn manifest_schema_bump_forces_a_full_reindex() {
    let project_dir = tempfile::tempdir().unwrap();
    let data_dir = tempfile::tempdir().unwrap();
    write_project(project_dir.path());

    let container = Container::new(test_config(data_dir.path().to_path_buf())).await.unwrap();
    let index_use_case = container.index_use_case();
    index_use_case
        .execute("repo-1", "rev-1", project_dir.path(), CancellationToken::new())
        .await
        .unwrap();

    let manifest_path = data_dir.path().join("manifests").join("repo-1.json");
    let text = fs::read_to_string(&manifest_path).unwrap();
    let mut json: serde_json::Value = serde_json::from_str(&text).unwrap();
    json["schema_version"] = serde_json::json!(0);
    fs::write(&manifest_path, serde_json::to_string_pretty(&json).unwrap()).unwrap();

    assert!(index_use_case.manifest_needs_reindex("repo-1").unwrap());

    let (stats, failures) = index_use_case
        .execute("repo-1", "rev-2", project_dir.path(), CancellationToken::new())
        .await
        .unwrap();
    assert!(failures.is_empty());
    assert_eq!(stats.files_new, 2, "a stale schema must force every file to be treated as new");

    assert!(!index_use_case.manifest_needs_reindex("repo-1").unwrap());
}
