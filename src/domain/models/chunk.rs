use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The kind of symbol a `Chunk` was parsed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Class,
    Method,
    Module,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Class => "class",
            SymbolKind::Method => "method",
            SymbolKind::Module => "module",
        }
    }
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The kind of a non-symbol ("block") chunk, emitted for recall over code
/// regions that don't correspond to a language-level declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    StatementGroup,
    Block,
    MarkdownSection,
    Unknown,
}

impl BlockKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::StatementGroup => "statement_group",
            BlockKind::Block => "block",
            BlockKind::MarkdownSection => "markdown_section",
            BlockKind::Unknown => "unknown",
        }
    }
}

/// Discriminates the two chunk shapes described in spec §3: a `Symbol`
/// chunk's boundary corresponds to a language-level declaration; a `Block`
/// chunk is a recall-only code region that may overlap symbol chunks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "chunk_kind", rename_all = "snake_case")]
pub enum ChunkKind {
    Symbol {
        symbol_kind: SymbolKind,
        symbol_name: String,
        qualname: String,
        parent_symbol_id: Option<String>,
        signature: Option<String>,
        docstring: Option<String>,
        is_exported: bool,
        decorator_names: Vec<String>,
    },
    Block {
        block_kind: BlockKind,
        owner_symbol_id: Option<String>,
    },
}

impl ChunkKind {
    pub fn is_symbol(&self) -> bool {
        matches!(self, ChunkKind::Symbol { .. })
    }

    pub fn symbol_kind(&self) -> Option<SymbolKind> {
        match self {
            ChunkKind::Symbol { symbol_kind, .. } => Some(*symbol_kind),
            ChunkKind::Block { .. } => None,
        }
    }

    pub fn symbol_name(&self) -> Option<&str> {
        match self {
            ChunkKind::Symbol { symbol_name, .. } => Some(symbol_name),
            ChunkKind::Block { .. } => None,
        }
    }
}

/// A unit of code (symbol- or block-sized) with the metadata needed to
/// embed, cache, persist, and rank it. See spec §3 "Chunk (symbol)" and
/// "Block chunk" — both shapes are unified here via `ChunkKind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    symbol_id: String,
    repo_id: String,
    revision: String,
    file_path: String,
    extension: String,
    start_line: u32,
    end_line: u32,
    start_byte: usize,
    end_byte: usize,
    kind: ChunkKind,
    context_header: String,
    code_text: String,
    search_text: String,
    identifiers: Vec<String>,
    identifier_parts: Vec<String>,
    called_names: Vec<String>,
    string_literals: Vec<String>,
    content_hash: String,
    file_hash: String,
    vec_summary: Option<Vec<f32>>,
}

#[allow(clippy::too_many_arguments)]
pub struct ChunkBuilder {
    repo_id: String,
    revision: String,
    file_path: String,
    extension: String,
    start_line: u32,
    end_line: u32,
    start_byte: usize,
    end_byte: usize,
    kind: ChunkKind,
    context_header: String,
    code_text: String,
    identifiers: Vec<String>,
    called_names: Vec<String>,
    string_literals: Vec<String>,
    file_hash: String,
}

impl ChunkBuilder {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repo_id: impl Into<String>,
        revision: impl Into<String>,
        file_path: impl Into<String>,
        extension: impl Into<String>,
        start_line: u32,
        end_line: u32,
        start_byte: usize,
        end_byte: usize,
        kind: ChunkKind,
        context_header: impl Into<String>,
        code_text: impl Into<String>,
        file_hash: impl Into<String>,
    ) -> Self {
        Self {
            repo_id: repo_id.into(),
            revision: revision.into(),
            file_path: file_path.into(),
            extension: extension.into(),
            start_line,
            end_line,
            start_byte,
            end_byte,
            kind,
            context_header: context_header.into(),
            code_text: code_text.into(),
            identifiers: Vec::new(),
            called_names: Vec::new(),
            string_literals: Vec::new(),
            file_hash: file_hash.into(),
        }
    }

    pub fn with_identifiers(mut self, identifiers: Vec<String>) -> Self {
        self.identifiers = identifiers;
        self
    }

    pub fn with_called_names(mut self, names: Vec<String>) -> Self {
        self.called_names = names;
        self
    }

    pub fn with_string_literals(mut self, literals: Vec<String>) -> Self {
        self.string_literals = literals;
        self
    }

    pub fn build(self) -> Chunk {
        assert!(
            self.start_line >= 1 && self.start_line <= self.end_line,
            "chunk line range invariant violated: {}..{}",
            self.start_line,
            self.end_line
        );

        let content_hash = compute_content_hash(&self.context_header, &self.code_text);
        let symbol_id = compute_symbol_id(&self.file_path, self.start_line, self.end_line, &content_hash);
        let identifier_parts = split_identifier_parts(&self.identifiers);
        let search_text = build_search_text(
            &self.context_header,
            &self.code_text,
            self.kind.symbol_name(),
        );

        Chunk {
            symbol_id,
            repo_id: self.repo_id,
            revision: self.revision,
            file_path: self.file_path,
            extension: self.extension,
            start_line: self.start_line,
            end_line: self.end_line,
            start_byte: self.start_byte,
            end_byte: self.end_byte,
            kind: self.kind,
            context_header: self.context_header,
            code_text: self.code_text,
            search_text,
            identifiers: self.identifiers,
            identifier_parts,
            called_names: self.called_names,
            string_literals: self.string_literals,
            content_hash,
            file_hash: self.file_hash,
            vec_summary: None,
        }
    }
}

/// `content_hash = SHA256(context_header || "\n" || code_text)` — the
/// stable identity used by the embedding cache and row upsert (spec §3,
/// GLOSSARY "Content hash").
pub fn compute_content_hash(context_header: &str, code_text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(context_header.as_bytes());
    hasher.update(b"\n");
    hasher.update(code_text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// `symbol_id = SHA256(file_path || ":" || start_line || "-" || end_line || ":" || content_hash)`.
pub fn compute_symbol_id(file_path: &str, start_line: u32, end_line: u32, content_hash: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}:{}-{}:{}", file_path, start_line, end_line, content_hash).as_bytes());
    format!("{:x}", hasher.finalize())
}

fn split_identifier_parts(identifiers: &[String]) -> Vec<String> {
    let mut parts = Vec::new();
    for ident in identifiers {
        for word in split_camel_and_snake(ident) {
            if !parts.contains(&word) {
                parts.push(word);
            }
        }
    }
    parts
}

/// Splits `getUserById` / `get_user_by_id` into `["get", "user", "by", "id"]`
/// for lexical recall over sub-tokens of an identifier.
pub fn split_camel_and_snake(ident: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for ch in ident.chars() {
        if ch == '_' || ch == '-' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current).to_lowercase());
            }
            prev_lower = false;
            continue;
        }
        if ch.is_uppercase() && prev_lower {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current).to_lowercase());
            }
        }
        prev_lower = ch.is_lowercase() || ch.is_numeric();
        current.push(ch);
    }
    if !current.is_empty() {
        words.push(current.to_lowercase());
    }
    words.retain(|w| !w.is_empty());
    words
}

fn build_search_text(context_header: &str, code_text: &str, symbol_name: Option<&str>) -> String {
    match symbol_name {
        Some(name) => format!("{}\n{}\n{}", name, context_header, code_text),
        None => format!("{}\n{}", context_header, code_text),
    }
}

impl Chunk {
    /// Reconstitutes a row persisted by the store (used by adapters).
    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        symbol_id: String,
        repo_id: String,
        revision: String,
        file_path: String,
        extension: String,
        start_line: u32,
        end_line: u32,
        start_byte: usize,
        end_byte: usize,
        kind: ChunkKind,
        context_header: String,
        code_text: String,
        search_text: String,
        identifiers: Vec<String>,
        identifier_parts: Vec<String>,
        called_names: Vec<String>,
        string_literals: Vec<String>,
        content_hash: String,
        file_hash: String,
        vec_summary: Option<Vec<f32>>,
    ) -> Self {
        Self {
            symbol_id,
            repo_id,
            revision,
            file_path,
            extension,
            start_line,
            end_line,
            start_byte,
            end_byte,
            kind,
            context_header,
            code_text,
            search_text,
            identifiers,
            identifier_parts,
            called_names,
            string_literals,
            content_hash,
            file_hash,
            vec_summary,
        }
    }

    pub fn with_vector(mut self, vector: Vec<f32>) -> Self {
        self.vec_summary = Some(vector);
        self
    }

    pub fn symbol_id(&self) -> &str {
        &self.symbol_id
    }
    pub fn repo_id(&self) -> &str {
        &self.repo_id
    }
    pub fn revision(&self) -> &str {
        &self.revision
    }
    pub fn file_path(&self) -> &str {
        &self.file_path
    }
    pub fn extension(&self) -> &str {
        &self.extension
    }
    pub fn start_line(&self) -> u32 {
        self.start_line
    }
    pub fn end_line(&self) -> u32 {
        self.end_line
    }
    pub fn start_byte(&self) -> usize {
        self.start_byte
    }
    pub fn end_byte(&self) -> usize {
        self.end_byte
    }
    pub fn kind(&self) -> &ChunkKind {
        &self.kind
    }
    pub fn context_header(&self) -> &str {
        &self.context_header
    }
    pub fn code_text(&self) -> &str {
        &self.code_text
    }
    pub fn search_text(&self) -> &str {
        &self.search_text
    }
    pub fn identifiers(&self) -> &[String] {
        &self.identifiers
    }
    pub fn identifier_parts(&self) -> &[String] {
        &self.identifier_parts
    }
    pub fn called_names(&self) -> &[String] {
        &self.called_names
    }
    pub fn string_literals(&self) -> &[String] {
        &self.string_literals
    }
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }
    pub fn file_hash(&self) -> &str {
        &self.file_hash
    }
    pub fn vector(&self) -> Option<&[f32]> {
        self.vec_summary.as_deref()
    }

    pub fn symbol_name(&self) -> Option<&str> {
        self.kind.symbol_name()
    }

    pub fn symbol_kind(&self) -> Option<SymbolKind> {
        self.kind.symbol_kind()
    }

    pub fn is_exported(&self) -> bool {
        matches!(&self.kind, ChunkKind::Symbol { is_exported, .. } if *is_exported)
    }

    pub fn line_count(&self) -> u32 {
        self.end_line.saturating_sub(self.start_line) + 1
    }

    pub fn location(&self) -> String {
        format!("{}:{}-{}", self.file_path, self.start_line, self.end_line)
    }
}
