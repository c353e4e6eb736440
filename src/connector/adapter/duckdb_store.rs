use std::collections::HashMap;
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use duckdb::{params, Connection, Row, ToSql};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::domain::{
    BlockKind, Chunk, ChunkKind, ChunkStore, EmbeddingCacheRepository, EmbeddingCacheRow, Filter, FileRow,
    IndexError, Ref, RefKind, SearchHit, SearchOptions, SymbolKind,
};

const CHUNK_COLUMNS: &str = "symbol_id, repo_id, revision, file_path, extension, start_line, end_line, \
    start_byte, end_byte, chunk_kind, symbol_kind, symbol_name, qualname, parent_symbol_id, signature, \
    docstring, is_exported, decorator_names, block_kind, owner_symbol_id, context_header, code_text, \
    search_text, identifiers, identifier_parts, called_names, string_literals, content_hash, file_hash";

/// The vector + full-text store backing `ChunkStore` and
/// `EmbeddingCacheRepository` (spec §4.7, §4.4), over a single DuckDB file.
/// Uses the `vss` extension (HNSW index, cosine distance) for the vector leg
/// and the `fts` extension (BM25 via `match_bm25`) for the lexical leg.
pub struct DuckdbStore {
    conn: Arc<Mutex<Connection>>,
    dimensions: usize,
    fts_dirty: AtomicBool,
}

impl DuckdbStore {
    pub fn open(path: &Path, dimensions: usize) -> Result<Self, IndexError> {
        let conn = Connection::open(path).map_err(|e| IndexError::storage(format!("failed to open DuckDB database: {}", e)))?;
        Self::from_connection(conn, dimensions)
    }

    #[allow(dead_code)]
    pub fn in_memory(dimensions: usize) -> Result<Self, IndexError> {
        let conn = Connection::open_in_memory().map_err(|e| IndexError::storage(format!("failed to open in-memory DuckDB: {}", e)))?;
        Self::from_connection(conn, dimensions)
    }

    fn from_connection(conn: Connection, dimensions: usize) -> Result<Self, IndexError> {
        conn.execute_batch("INSTALL vss; LOAD vss; SET hnsw_enable_experimental_persistence = true; INSTALL fts; LOAD fts;")
            .map_err(|e| IndexError::storage(format!("failed to load vss/fts extensions: {}", e)))?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS store_meta (key TEXT PRIMARY KEY, value TEXT NOT NULL);",
        )
        .map_err(|e| IndexError::storage(format!("failed to create store_meta table: {}", e)))?;

        Self::ensure_dimensions(&conn, "chunks", dimensions)?;
        create_chunks_table(&conn, dimensions)?;
        create_files_table(&conn)?;
        create_refs_table(&conn)?;
        Self::ensure_dimensions(&conn, "embedding_cache", dimensions)?;
        create_embedding_cache_table(&conn, dimensions)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            dimensions,
            fts_dirty: AtomicBool::new(true),
        })
    }

    /// Compares the dimensionality recorded the last time `table` was
    /// created against `dimensions`; on mismatch (or first run) drops the
    /// table so the caller's `CREATE TABLE IF NOT EXISTS` recreates it with
    /// the right `FLOAT[D]` width (spec §4.7/§4.4 dimension-mismatch
    /// protocol). DuckDB's catalog doesn't expose a list column's length
    /// directly, so the width is tracked in `store_meta` instead.
    fn ensure_dimensions(conn: &Connection, table: &str, dimensions: usize) -> Result<(), IndexError> {
        let key = format!("{}_dimensions", table);
        let stored: Option<i64> = conn
            .query_row("SELECT value FROM store_meta WHERE key = ?", params![key], |row| {
                row.get::<_, String>(0)
            })
            .ok()
            .and_then(|s| s.parse().ok());

        if stored == Some(dimensions as i64) {
            return Ok(());
        }

        if stored.is_some() {
            warn!(table, configured = dimensions, previous = ?stored, "vector dimension mismatch, dropping table for recreation");
        }
        conn.execute_batch(&format!("DROP TABLE IF EXISTS {};", table))
            .map_err(|e| IndexError::storage(format!("failed to drop {} for dimension change: {}", table, e)))?;
        conn.execute(
            "INSERT OR REPLACE INTO store_meta (key, value) VALUES (?, ?)",
            params![key, dimensions.to_string()],
        )
        .map_err(|e| IndexError::storage(format!("failed to record dimensions for {}: {}", table, e)))?;
        Ok(())
    }

    fn vector_literal(&self, vector: &[f32]) -> Result<String, IndexError> {
        if vector.len() != self.dimensions {
            return Err(IndexError::invalid_input(format!(
                "expected vector of dimension {}, got {}",
                self.dimensions,
                vector.len()
            )));
        }
        let mut out = String::with_capacity(vector.len() * 8 + 16);
        out.push('[');
        for (i, v) in vector.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str(&v.to_string());
        }
        out.push_str(&format!("]::FLOAT[{}]", self.dimensions));
        Ok(out)
    }

    fn rebuild_fts_index(conn: &Connection) -> Result<(), IndexError> {
        conn.execute_batch("PRAGMA create_fts_index('chunks', 'symbol_id', 'search_text', overwrite=1);")
            .map_err(|e| IndexError::storage(format!("failed to (re)build fts index: {}", e)))?;
        Ok(())
    }
}

fn create_chunks_table(conn: &Connection, dimensions: usize) -> Result<(), IndexError> {
    let sql = format!(
        "CREATE TABLE IF NOT EXISTS chunks (
            symbol_id TEXT PRIMARY KEY,
            repo_id TEXT NOT NULL,
            revision TEXT NOT NULL,
            file_path TEXT NOT NULL,
            extension TEXT NOT NULL,
            start_line INTEGER NOT NULL,
            end_line INTEGER NOT NULL,
            start_byte BIGINT NOT NULL,
            end_byte BIGINT NOT NULL,
            chunk_kind TEXT NOT NULL,
            symbol_kind TEXT,
            symbol_name TEXT,
            qualname TEXT,
            parent_symbol_id TEXT,
            signature TEXT,
            docstring TEXT,
            is_exported BOOLEAN,
            decorator_names TEXT,
            block_kind TEXT,
            owner_symbol_id TEXT,
            context_header TEXT NOT NULL,
            code_text TEXT NOT NULL,
            search_text TEXT NOT NULL,
            identifiers TEXT NOT NULL,
            identifier_parts TEXT NOT NULL,
            called_names TEXT NOT NULL,
            string_literals TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            file_hash TEXT NOT NULL,
            vector FLOAT[{dims}]
        );
        CREATE INDEX IF NOT EXISTS chunks_repo_idx ON chunks (repo_id);
        CREATE INDEX IF NOT EXISTS chunks_filepath_idx ON chunks (repo_id, file_path);
        CREATE INDEX IF NOT EXISTS chunks_vector_hnsw_idx ON chunks USING HNSW (vector) WITH (metric = 'cosine');",
        dims = dimensions
    );
    conn.execute_batch(&sql)
        .map_err(|e| IndexError::storage(format!("failed to create chunks table: {}", e)))
}

fn create_files_table(conn: &Connection) -> Result<(), IndexError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS files (
            file_id TEXT PRIMARY KEY,
            repo_id TEXT NOT NULL,
            revision TEXT NOT NULL,
            file_path TEXT NOT NULL,
            extension TEXT NOT NULL,
            file_hash TEXT NOT NULL,
            imports TEXT NOT NULL,
            exports TEXT NOT NULL,
            top_level_doc TEXT,
            file_summary_text TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS files_repo_idx ON files (repo_id);",
    )
    .map_err(|e| IndexError::storage(format!("failed to create files table: {}", e)))
}

fn create_refs_table(conn: &Connection) -> Result<(), IndexError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS refs (
            ref_id TEXT PRIMARY KEY,
            repo_id TEXT NOT NULL,
            revision TEXT NOT NULL,
            file_path TEXT NOT NULL,
            start_line INTEGER NOT NULL,
            end_line INTEGER NOT NULL,
            ref_kind TEXT NOT NULL,
            token_text TEXT NOT NULL,
            context_snippet TEXT NOT NULL,
            module_name TEXT,
            imported_name TEXT
        );
        CREATE INDEX IF NOT EXISTS refs_repo_filepath_idx ON refs (repo_id, file_path);
        CREATE INDEX IF NOT EXISTS refs_token_idx ON refs (repo_id, token_text);",
    )
    .map_err(|e| IndexError::storage(format!("failed to create refs table: {}", e)))
}

fn create_embedding_cache_table(conn: &Connection, dimensions: usize) -> Result<(), IndexError> {
    let sql = format!(
        "CREATE TABLE IF NOT EXISTS embedding_cache (
            input_hash TEXT PRIMARY KEY,
            vector FLOAT[{dims}] NOT NULL,
            created_at BIGINT NOT NULL
        );",
        dims = dimensions
    );
    conn.execute_batch(&sql)
        .map_err(|e| IndexError::storage(format!("failed to create embedding_cache table: {}", e)))
}

fn json_of(values: &[String]) -> String {
    serde_json::to_string(values).unwrap_or_else(|_| "[]".to_string())
}

fn parse_json(s: &str) -> Vec<String> {
    serde_json::from_str(s).unwrap_or_default()
}

fn symbol_kind_from_str(s: &str) -> SymbolKind {
    match s {
        "function" => SymbolKind::Function,
        "class" => SymbolKind::Class,
        "method" => SymbolKind::Method,
        _ => SymbolKind::Module,
    }
}

fn block_kind_from_str(s: &str) -> BlockKind {
    match s {
        "statement_group" => BlockKind::StatementGroup,
        "block" => BlockKind::Block,
        "markdown_section" => BlockKind::MarkdownSection,
        _ => BlockKind::Unknown,
    }
}

fn ref_kind_from_str(s: &str) -> RefKind {
    match s {
        "import" => RefKind::Import,
        "call" => RefKind::Call,
        _ => RefKind::Identifier,
    }
}

fn row_to_chunk(row: &Row) -> duckdb::Result<Chunk> {
    let chunk_kind: String = row.get(9)?;
    let kind = if chunk_kind == "symbol" {
        ChunkKind::Symbol {
            symbol_kind: symbol_kind_from_str(&row.get::<_, Option<String>>(10)?.unwrap_or_default()),
            symbol_name: row.get::<_, Option<String>>(11)?.unwrap_or_default(),
            qualname: row.get::<_, Option<String>>(12)?.unwrap_or_default(),
            parent_symbol_id: row.get(13)?,
            signature: row.get(14)?,
            docstring: row.get(15)?,
            is_exported: row.get::<_, Option<bool>>(16)?.unwrap_or(false),
            decorator_names: parse_json(&row.get::<_, Option<String>>(17)?.unwrap_or_default()),
        }
    } else {
        ChunkKind::Block {
            block_kind: block_kind_from_str(&row.get::<_, Option<String>>(18)?.unwrap_or_default()),
            owner_symbol_id: row.get(19)?,
        }
    };

    Ok(Chunk::reconstitute(
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        u32::try_from(row.get::<_, i64>(5)?).unwrap_or(0),
        u32::try_from(row.get::<_, i64>(6)?).unwrap_or(0),
        usize::try_from(row.get::<_, i64>(7)?).unwrap_or(0),
        usize::try_from(row.get::<_, i64>(8)?).unwrap_or(0),
        kind,
        row.get(20)?,
        row.get(21)?,
        row.get(22)?,
        parse_json(&row.get::<_, String>(23)?),
        parse_json(&row.get::<_, String>(24)?),
        parse_json(&row.get::<_, String>(25)?),
        parse_json(&row.get::<_, String>(26)?),
        row.get(27)?,
        row.get(28)?,
        None,
    ))
}

fn row_to_search_hit(row: &Row, score_col: usize) -> duckdb::Result<SearchHit> {
    let chunk = row_to_chunk(row)?;
    let score: f32 = row.get(score_col)?;
    Ok(SearchHit {
        id: chunk.symbol_id().to_string(),
        file_path: chunk.file_path().to_string(),
        filename: std::path::Path::new(chunk.file_path())
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(chunk.file_path())
            .to_string(),
        start_line: chunk.start_line(),
        end_line: chunk.end_line(),
        symbol_name: chunk.symbol_name().map(str::to_string),
        symbol_kind: chunk.symbol_kind(),
        score,
        vector_score: Some(score),
        fts_score: None,
        signature: match chunk.kind() {
            ChunkKind::Symbol { signature, .. } => signature.clone(),
            ChunkKind::Block { .. } => None,
        },
        is_exported: chunk.is_exported(),
    })
}

/// Compiles the filter AST into a parameterized WHERE fragment (spec §4.7:
/// "Strings must be escaped against injection") — every leaf value is bound
/// through `params`, never interpolated into the SQL string itself.
fn compile_filter(filter: &Filter, params: &mut Vec<Box<dyn ToSql>>) -> String {
    match filter {
        Filter::PathPrefix(prefix) => {
            params.push(Box::new(format!("{}%", prefix)));
            "file_path LIKE ?".to_string()
        }
        Filter::PathContains(needle) => {
            params.push(Box::new(format!("%{}%", needle)));
            "file_path LIKE ?".to_string()
        }
        Filter::PathNotContains(needle) => {
            params.push(Box::new(format!("%{}%", needle)));
            "file_path NOT LIKE ?".to_string()
        }
        Filter::ExtensionIn(exts) => {
            let placeholders = vec!["?"; exts.len()].join(", ");
            for ext in exts {
                params.push(Box::new(ext.clone()));
            }
            format!("extension IN ({})", placeholders)
        }
        Filter::SymbolKindIn(kinds) => {
            let placeholders = vec!["?"; kinds.len()].join(", ");
            for kind in kinds {
                params.push(Box::new(kind.as_str().to_string()));
            }
            format!("symbol_kind IN ({})", placeholders)
        }
        Filter::IsExported(expected) => {
            params.push(Box::new(*expected));
            "is_exported = ?".to_string()
        }
        Filter::HasDocstring(true) => "docstring IS NOT NULL".to_string(),
        Filter::HasDocstring(false) => "docstring IS NULL".to_string(),
        Filter::DecoratorContains(name) => {
            params.push(Box::new(format!("%\"{}\"%", name)));
            "decorator_names LIKE ?".to_string()
        }
        Filter::And(clauses) => {
            let parts: Vec<String> = clauses.iter().map(|c| compile_filter(c, params)).collect();
            format!("({})", parts.join(" AND "))
        }
        Filter::Or(clauses) => {
            let parts: Vec<String> = clauses.iter().map(|c| compile_filter(c, params)).collect();
            format!("({})", parts.join(" OR "))
        }
    }
}

#[async_trait]
impl ChunkStore for DuckdbStore {
    async fn upsert_chunks(&self, rows: &[Chunk]) -> Result<(), IndexError> {
        if rows.is_empty() {
            return Ok(());
        }
        let conn = self.conn.lock().await;
        for chunk in rows {
            self.insert_chunk(&conn, chunk, "INSERT OR REPLACE")?;
        }
        self.fts_dirty.store(true, Ordering::Relaxed);
        debug!(count = rows.len(), "upserted chunks");
        Ok(())
    }

    async fn add_chunks(&self, rows: &[Chunk]) -> Result<(), IndexError> {
        if rows.is_empty() {
            return Ok(());
        }
        let conn = self.conn.lock().await;
        for chunk in rows {
            self.insert_chunk(&conn, chunk, "INSERT")?;
        }
        self.fts_dirty.store(true, Ordering::Relaxed);
        Ok(())
    }

    async fn reset_chunks(&self) -> Result<(), IndexError> {
        let conn = self.conn.lock().await;
        conn.execute_batch("DROP TABLE IF EXISTS chunks;")
            .map_err(|e| IndexError::storage(format!("failed to drop chunks table: {}", e)))?;
        create_chunks_table(&conn, self.dimensions)?;
        self.fts_dirty.store(true, Ordering::Relaxed);
        Ok(())
    }

    async fn upsert_files(&self, rows: &[FileRow]) -> Result<(), IndexError> {
        if rows.is_empty() {
            return Ok(());
        }
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                "INSERT OR REPLACE INTO files \
                 (file_id, repo_id, revision, file_path, extension, file_hash, imports, exports, top_level_doc, file_summary_text) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .map_err(|e| IndexError::storage(format!("failed to prepare file upsert: {}", e)))?;
        for row in rows {
            stmt.execute(params![
                row.file_id(),
                row.repo_id(),
                row.revision(),
                row.file_path(),
                row.extension(),
                row.file_hash(),
                json_of(row.imports()),
                json_of(row.exports()),
                row.top_level_doc(),
                row.file_summary_text(),
            ])
            .map_err(|e| IndexError::storage(format!("failed to upsert file row: {}", e)))?;
        }
        Ok(())
    }

    async fn upsert_refs(&self, rows: &[Ref]) -> Result<(), IndexError> {
        if rows.is_empty() {
            return Ok(());
        }
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                "INSERT OR REPLACE INTO refs \
                 (ref_id, repo_id, revision, file_path, start_line, end_line, ref_kind, token_text, context_snippet, module_name, imported_name) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .map_err(|e| IndexError::storage(format!("failed to prepare ref upsert: {}", e)))?;
        for r in rows {
            stmt.execute(params![
                r.ref_id(),
                r.repo_id(),
                r.revision(),
                r.file_path(),
                r.start_line() as i64,
                r.end_line() as i64,
                r.ref_kind().as_str(),
                r.token_text(),
                r.context_snippet(),
                r.module_name(),
                r.imported_name(),
            ])
            .map_err(|e| IndexError::storage(format!("failed to upsert ref row: {}", e)))?;
        }
        Ok(())
    }

    async fn delete_by_filepath(&self, repo_id: &str, file_path: &str) -> Result<u64, IndexError> {
        let conn = self.conn.lock().await;
        let deleted = conn
            .execute(
                "DELETE FROM chunks WHERE repo_id = ? AND file_path = ?",
                params![repo_id, file_path],
            )
            .map_err(|e| IndexError::storage(format!("failed to delete chunks by filepath: {}", e)))?;
        self.fts_dirty.store(true, Ordering::Relaxed);
        Ok(deleted as u64)
    }

    async fn delete_by_filepaths(&self, repo_id: &str, file_paths: &[String]) -> Result<u64, IndexError> {
        if file_paths.is_empty() {
            return Ok(0);
        }
        let conn = self.conn.lock().await;
        let placeholders = vec!["?"; file_paths.len()].join(", ");
        let sql = format!("DELETE FROM chunks WHERE repo_id = ? AND file_path IN ({})", placeholders);
        let mut params_vec: Vec<Box<dyn ToSql>> = vec![Box::new(repo_id.to_string())];
        for path in file_paths {
            params_vec.push(Box::new(path.clone()));
        }
        let params_refs: Vec<&dyn ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
        let deleted = conn
            .execute(&sql, params_refs.as_slice())
            .map_err(|e| IndexError::storage(format!("failed to delete chunks by filepaths: {}", e)))?;
        self.fts_dirty.store(true, Ordering::Relaxed);
        Ok(deleted as u64)
    }

    async fn delete_refs_by_filepath(&self, repo_id: &str, file_path: &str) -> Result<u64, IndexError> {
        let conn = self.conn.lock().await;
        let deleted = conn
            .execute("DELETE FROM refs WHERE repo_id = ? AND file_path = ?", params![repo_id, file_path])
            .map_err(|e| IndexError::storage(format!("failed to delete refs by filepath: {}", e)))?;
        Ok(deleted as u64)
    }

    async fn get_all_filepaths(&self, repo_id: &str) -> Result<HashSet<String>, IndexError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare("SELECT DISTINCT file_path FROM chunks WHERE repo_id = ?")
            .map_err(|e| IndexError::storage(format!("failed to prepare filepath scan: {}", e)))?;
        let rows = stmt
            .query_map(params![repo_id], |row| row.get::<_, String>(0))
            .map_err(|e| IndexError::storage(format!("failed to scan filepaths: {}", e)))?;
        let mut out = HashSet::new();
        for row in rows {
            out.insert(row.map_err(|e| IndexError::storage(format!("failed to read filepath row: {}", e)))?);
        }
        Ok(out)
    }

    async fn get_chunk(&self, symbol_id: &str) -> Result<Option<Chunk>, IndexError> {
        let conn = self.conn.lock().await;
        let sql = format!("SELECT {} FROM chunks WHERE symbol_id = ?", CHUNK_COLUMNS);
        conn.query_row(&sql, params![symbol_id], row_to_chunk)
            .map(Some)
            .or_else(|e| if matches!(e, duckdb::Error::QueryReturnedNoRows) { Ok(None) } else { Err(IndexError::storage(format!("failed to fetch chunk: {}", e))) })
    }

    async fn find_refs_by_token(&self, repo_id: &str, symbol_name: &str) -> Result<Vec<Ref>, IndexError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                "SELECT ref_id, repo_id, revision, file_path, start_line, end_line, ref_kind, token_text, \
                 context_snippet, module_name, imported_name \
                 FROM refs WHERE repo_id = ? AND (token_text = ? OR token_text LIKE '%.' || ?)",
            )
            .map_err(|e| IndexError::storage(format!("failed to prepare ref lookup: {}", e)))?;
        let rows = stmt
            .query_map(params![repo_id, symbol_name, symbol_name], |row| {
                Ok(Ref::reconstitute(
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    u32::try_from(row.get::<_, i64>(4)?).unwrap_or(0),
                    u32::try_from(row.get::<_, i64>(5)?).unwrap_or(0),
                    ref_kind_from_str(&row.get::<_, String>(6)?),
                    row.get(7)?,
                    row.get(8)?,
                    row.get(9)?,
                    row.get(10)?,
                ))
            })
            .map_err(|e| IndexError::storage(format!("failed to run ref lookup: {}", e)))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(|e| IndexError::storage(format!("failed to read ref row: {}", e)))?);
        }
        Ok(out)
    }

    async fn find_by_symbol_name(&self, repo_id: &str, symbol_name: &str) -> Result<Vec<Chunk>, IndexError> {
        let conn = self.conn.lock().await;
        let sql = format!(
            "SELECT {} FROM chunks WHERE repo_id = ? AND chunk_kind = 'symbol' AND symbol_name = ?",
            CHUNK_COLUMNS
        );
        let mut stmt = conn.prepare(&sql).map_err(|e| IndexError::storage(format!("failed to prepare symbol lookup: {}", e)))?;
        let rows = stmt
            .query_map(params![repo_id, symbol_name], row_to_chunk)
            .map_err(|e| IndexError::storage(format!("failed to run symbol lookup: {}", e)))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(|e| IndexError::storage(format!("failed to read symbol row: {}", e)))?);
        }
        Ok(out)
    }

    async fn vector_search(&self, repo_id: &str, query_vec: &[f32], options: &SearchOptions) -> Result<Vec<SearchHit>, IndexError> {
        let array_lit = self.vector_literal(query_vec)?;
        let conn = self.conn.lock().await;

        let mut params_vec: Vec<Box<dyn ToSql>> = vec![Box::new(repo_id.to_string())];
        let mut where_clause = "repo_id = ? AND vector IS NOT NULL".to_string();
        if let Some(filter) = &options.filter {
            where_clause.push_str(" AND ");
            where_clause.push_str(&compile_filter(filter, &mut params_vec));
        }

        let sql = format!(
            "SELECT {cols}, 1.0 / (1.0 + array_cosine_distance(vector, {array_lit})) AS score \
             FROM chunks WHERE {where_clause} \
             ORDER BY array_cosine_distance(vector, {array_lit}) LIMIT ?",
            cols = CHUNK_COLUMNS,
            array_lit = array_lit,
            where_clause = where_clause,
        );
        params_vec.push(Box::new(options.effective_limit() as i64));

        let params_refs: Vec<&dyn ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&sql).map_err(|e| IndexError::storage(format!("failed to prepare vector search: {}", e)))?;
        let rows = stmt
            .query_map(params_refs.as_slice(), |row| row_to_search_hit(row, 29))
            .map_err(|e| IndexError::storage(format!("failed to run vector search: {}", e)))?;

        let mut out = Vec::new();
        for row in rows {
            let hit = row.map_err(|e| IndexError::storage(format!("failed to read vector search row: {}", e)))?;
            if options.min_score.is_some_and(|min| hit.score < min) {
                continue;
            }
            out.push(hit);
        }
        Ok(out)
    }

    async fn fts_search(&self, repo_id: &str, query: &str, options: &SearchOptions) -> Result<Vec<SearchHit>, IndexError> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn.lock().await;
        if self.fts_dirty.swap(false, Ordering::Relaxed) {
            Self::rebuild_fts_index(&conn)?;
        }

        let mut params_vec: Vec<Box<dyn ToSql>> = vec![Box::new(query.to_string()), Box::new(repo_id.to_string())];
        let mut where_clause = "score IS NOT NULL AND repo_id = ?".to_string();
        if let Some(filter) = &options.filter {
            where_clause.push_str(" AND ");
            where_clause.push_str(&compile_filter(filter, &mut params_vec));
        }

        let sql = format!(
            "SELECT {cols}, fts_main_chunks.match_bm25(symbol_id, ?) AS score \
             FROM chunks WHERE {where_clause} \
             ORDER BY score DESC LIMIT ?",
            cols = CHUNK_COLUMNS,
            where_clause = where_clause,
        );
        params_vec.push(Box::new(options.effective_limit() as i64));

        let params_refs: Vec<&dyn ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&sql).map_err(|e| IndexError::storage(format!("failed to prepare fts search: {}", e)))?;
        let rows = stmt
            .query_map(params_refs.as_slice(), |row| {
                let chunk = row_to_chunk(row)?;
                let score: f32 = row.get(29)?;
                Ok(SearchHit {
                    id: chunk.symbol_id().to_string(),
                    file_path: chunk.file_path().to_string(),
                    filename: std::path::Path::new(chunk.file_path())
                        .file_name()
                        .and_then(|n| n.to_str())
                        .unwrap_or(chunk.file_path())
                        .to_string(),
                    start_line: chunk.start_line(),
                    end_line: chunk.end_line(),
                    symbol_name: chunk.symbol_name().map(str::to_string),
                    symbol_kind: chunk.symbol_kind(),
                    score,
                    vector_score: None,
                    fts_score: Some(score),
                    signature: match chunk.kind() {
                        ChunkKind::Symbol { signature, .. } => signature.clone(),
                        ChunkKind::Block { .. } => None,
                    },
                    is_exported: chunk.is_exported(),
                })
            })
            .map_err(|e| IndexError::storage(format!("failed to run fts search: {}", e)))?;

        let mut out = Vec::new();
        for row in rows {
            let hit = row.map_err(|e| IndexError::storage(format!("failed to read fts search row: {}", e)))?;
            if options.min_score.is_some_and(|min| hit.score < min) {
                continue;
            }
            out.push(hit);
        }
        Ok(out)
    }

    async fn count_chunks(&self, repo_id: &str) -> Result<u64, IndexError> {
        let conn = self.conn.lock().await;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM chunks WHERE repo_id = ?", params![repo_id], |row| row.get(0))
            .map_err(|e| IndexError::storage(format!("failed to count chunks: {}", e)))?;
        Ok(count as u64)
    }

    fn configured_dimensions(&self) -> usize {
        self.dimensions
    }
}

impl DuckdbStore {
    fn insert_chunk(&self, conn: &Connection, chunk: &Chunk, verb: &str) -> Result<(), IndexError> {
        let (chunk_kind, symbol_kind, symbol_name, qualname, parent_symbol_id, signature, docstring, is_exported, decorator_names, block_kind, owner_symbol_id) =
            match chunk.kind() {
                ChunkKind::Symbol {
                    symbol_kind,
                    symbol_name,
                    qualname,
                    parent_symbol_id,
                    signature,
                    docstring,
                    is_exported,
                    decorator_names,
                } => (
                    "symbol",
                    Some(symbol_kind.as_str().to_string()),
                    Some(symbol_name.clone()),
                    Some(qualname.clone()),
                    parent_symbol_id.clone(),
                    signature.clone(),
                    docstring.clone(),
                    Some(*is_exported),
                    Some(json_of(decorator_names)),
                    None,
                    None,
                ),
                ChunkKind::Block { block_kind, owner_symbol_id } => (
                    "block",
                    None,
                    None,
                    None,
                    None,
                    None,
                    None,
                    None,
                    None,
                    Some(block_kind.as_str().to_string()),
                    owner_symbol_id.clone(),
                ),
            };

        let vector_fragment = match chunk.vector() {
            Some(v) => self.vector_literal(v)?,
            None => "NULL".to_string(),
        };

        let sql = format!(
            "{verb} INTO chunks \
             (symbol_id, repo_id, revision, file_path, extension, start_line, end_line, start_byte, end_byte, \
              chunk_kind, symbol_kind, symbol_name, qualname, parent_symbol_id, signature, docstring, is_exported, \
              decorator_names, block_kind, owner_symbol_id, context_header, code_text, search_text, identifiers, \
              identifier_parts, called_names, string_literals, content_hash, file_hash, vector) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, {vector})",
            verb = verb,
            vector = vector_fragment,
        );

        conn.execute(
            &sql,
            params![
                chunk.symbol_id(),
                chunk.repo_id(),
                chunk.revision(),
                chunk.file_path(),
                chunk.extension(),
                chunk.start_line() as i64,
                chunk.end_line() as i64,
                chunk.start_byte() as i64,
                chunk.end_byte() as i64,
                chunk_kind,
                symbol_kind,
                symbol_name,
                qualname,
                parent_symbol_id,
                signature,
                docstring,
                is_exported,
                decorator_names,
                block_kind,
                owner_symbol_id,
                chunk.context_header(),
                chunk.code_text(),
                chunk.search_text(),
                json_of(chunk.identifiers()),
                json_of(chunk.identifier_parts()),
                json_of(chunk.called_names()),
                json_of(chunk.string_literals()),
                chunk.content_hash(),
                chunk.file_hash(),
            ],
        )
        .map_err(|e| IndexError::storage(format!("failed to upsert chunk {}: {}", chunk.symbol_id(), e)))?;
        Ok(())
    }
}

#[async_trait]
impl EmbeddingCacheRepository for DuckdbStore {
    async fn get_many(&self, hashes: &[String]) -> Result<HashMap<String, EmbeddingCacheRow>, IndexError> {
        if hashes.is_empty() {
            return Ok(HashMap::new());
        }
        let conn = self.conn.lock().await;
        let placeholders = vec!["?"; hashes.len()].join(", ");
        let sql = format!(
            "SELECT input_hash, created_at FROM embedding_cache WHERE input_hash IN ({})",
            placeholders
        );
        let params_vec: Vec<Box<dyn ToSql>> = hashes.iter().map(|h| Box::new(h.clone()) as Box<dyn ToSql>).collect();
        let params_refs: Vec<&dyn ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();

        // Vectors can't travel through the generic row-mapping closure as a
        // typed list easily, so fetch hash/created_at here and the vector
        // per-row via a point query keyed by hash.
        let mut stmt = conn.prepare(&sql).map_err(|e| IndexError::storage(format!("failed to prepare cache lookup: {}", e)))?;
        let rows = stmt
            .query_map(params_refs.as_slice(), |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
            .map_err(|e| IndexError::storage(format!("failed to run cache lookup: {}", e)))?;

        let mut out = HashMap::new();
        for row in rows {
            let (hash, created_at) = row.map_err(|e| IndexError::storage(format!("failed to read cache row: {}", e)))?;
            let vector = self.fetch_cached_vector(&conn, &hash)?;
            out.insert(hash.clone(), EmbeddingCacheRow::new(hash, vector, created_at));
        }
        Ok(out)
    }

    async fn upsert_many(&self, rows: &[EmbeddingCacheRow]) -> Result<(), IndexError> {
        if rows.is_empty() {
            return Ok(());
        }
        let conn = self.conn.lock().await;
        for row in rows {
            let array_lit = self.vector_literal(row.vector())?;
            let sql = format!(
                "INSERT OR REPLACE INTO embedding_cache (input_hash, vector, created_at) VALUES (?, {}, ?)",
                array_lit
            );
            conn.execute(&sql, params![row.input_hash(), row.created_at()])
                .map_err(|e| IndexError::storage(format!("failed to upsert embedding cache row: {}", e)))?;
        }
        Ok(())
    }

    async fn reset(&self) -> Result<(), IndexError> {
        let conn = self.conn.lock().await;
        conn.execute_batch("DROP TABLE IF EXISTS embedding_cache;")
            .map_err(|e| IndexError::storage(format!("failed to drop embedding_cache table: {}", e)))?;
        create_embedding_cache_table(&conn, self.dimensions)?;
        Ok(())
    }
}

impl DuckdbStore {
    /// DuckDB's `FromSql` doesn't map `FLOAT[D]` into a `Vec<f32>` through
    /// the generic row-mapping closures used above, so cached vectors are
    /// read back with `list_value`'s string form and parsed directly.
    fn fetch_cached_vector(&self, conn: &Connection, hash: &str) -> Result<Vec<f32>, IndexError> {
        let text: String = conn
            .query_row(
                "SELECT array_to_string(vector, ',') FROM embedding_cache WHERE input_hash = ?",
                params![hash],
                |row| row.get(0),
            )
            .map_err(|e| IndexError::storage(format!("failed to read cached vector: {}", e)))?;
        Ok(text.split(',').filter_map(|s| s.parse::<f32>().ok()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChunkBuilder, SearchIntent};

    fn sample_chunk(repo: &str, name: &str, vector: Vec<f32>) -> Chunk {
        ChunkBuilder::new(
            repo,
            "rev-1",
            "src/lib.rs",
            "rs",
            1,
            3,
            0,
            30,
            ChunkKind::Symbol {
                symbol_kind: SymbolKind::Function,
                symbol_name: name.to_string(),
                qualname: name.to_string(),
                parent_symbol_id: None,
                signature: Some(format!("fn {}()", name)),
                docstring: None,
                is_exported: true,
                decorator_names: vec![],
            },
            format!("// src/lib.rs :: {}", name),
            format!("fn {}() {{}}", name),
            "filehash",
        )
        .with_identifiers(vec![name.to_string()])
        .build()
        .with_vector(vector)
    }

    #[tokio::test]
    async fn round_trips_a_chunk_through_get_chunk() {
        let store = DuckdbStore::in_memory(4).unwrap();
        let chunk = sample_chunk("repo-1", "handle_request", vec![0.1, 0.2, 0.3, 0.4]);
        let id = chunk.symbol_id().to_string();
        store.upsert_chunks(&[chunk]).await.unwrap();

        let fetched = store.get_chunk(&id).await.unwrap().unwrap();
        assert_eq!(fetched.symbol_name(), Some("handle_request"));
        assert_eq!(fetched.repo_id(), "repo-1");
    }

    #[tokio::test]
    async fn vector_search_ranks_by_cosine_similarity() {
        let store = DuckdbStore::in_memory(3).unwrap();
        let near = sample_chunk("repo-1", "near", vec![1.0, 0.0, 0.0]);
        let far = sample_chunk("repo-1", "far", vec![0.0, 1.0, 0.0]);
        store.upsert_chunks(&[near, far]).await.unwrap();

        let hits = store
            .vector_search("repo-1", &[1.0, 0.0, 0.0], &SearchOptions { intent: SearchIntent::SimilarCode, ..Default::default() })
            .await
            .unwrap();
        assert_eq!(hits[0].symbol_name.as_deref(), Some("near"));
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn fts_search_finds_by_lexical_match() {
        let store = DuckdbStore::in_memory(3).unwrap();
        let chunk = sample_chunk("repo-1", "handle_request", vec![0.1, 0.2, 0.3]);
        store.upsert_chunks(&[chunk]).await.unwrap();

        let hits = store
            .fts_search("repo-1", "handle_request", &SearchOptions::default())
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].symbol_name.as_deref(), Some("handle_request"));
    }

    #[tokio::test]
    async fn delete_by_filepath_removes_matching_rows() {
        let store = DuckdbStore::in_memory(3).unwrap();
        let chunk = sample_chunk("repo-1", "gone", vec![0.1, 0.2, 0.3]);
        store.upsert_chunks(&[chunk]).await.unwrap();

        let deleted = store.delete_by_filepath("repo-1", "src/lib.rs").await.unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(store.count_chunks("repo-1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn embedding_cache_round_trips() {
        let store = DuckdbStore::in_memory(3).unwrap();
        let row = EmbeddingCacheRow::new("hash-1", vec![0.5, 0.25, 0.125], 1000);
        store.upsert_many(&[row]).await.unwrap();

        let cached = store.get_many(&["hash-1".to_string()]).await.unwrap();
        let entry = cached.get("hash-1").unwrap();
        assert!(entry.matches_dimensions(3));
        assert_eq!(entry.created_at(), 1000);
    }

    #[tokio::test]
    async fn find_refs_by_token_matches_qualified_suffix() {
        let store = DuckdbStore::in_memory(3).unwrap();
        let r = Ref::new("repo-1", "rev-1", "src/lib.rs", 4, 4, RefKind::Call, "auth.login", "auth.login();");
        store.upsert_refs(&[r]).await.unwrap();

        let hits = store.find_refs_by_token("repo-1", "login").await.unwrap();
        assert_eq!(hits.len(), 1);
    }
}
