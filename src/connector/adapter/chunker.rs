use std::path::Path;

use sha2::{Digest, Sha256};
use streaming_iterator::StreamingIterator;
use tracing::warn;
use tree_sitter::{Parser, Query, QueryCursor};

use crate::application::{ChunkerService, ParsedFile};
use crate::domain::{
    BlockKind, Chunk, ChunkBuilder, ChunkKind, ExportMarker, FileRow, IndexError, Language, Ref, RefKind,
    SymbolKind,
};

/// Strips surrounding quotes/angle-brackets from an import path literal
/// (Go `"fmt"`, Rust `use` targets quoted by the grammar in some dialects).
fn normalize_import_path(path: &str) -> String {
    let trimmed = path.trim();
    if trimmed.len() < 2 {
        return trimmed.to_string();
    }
    if (trimmed.starts_with('"') && trimmed.ends_with('"')) || (trimmed.starts_with('\'') && trimmed.ends_with('\'')) {
        return trimmed[1..trimmed.len() - 1].to_string();
    }
    if trimmed.starts_with('<') && trimmed.ends_with('>') {
        return trimmed[1..trimmed.len() - 1].to_string();
    }
    trimmed.to_string()
}

/// Keywords and primitive type names that show up constantly as bare
/// identifiers and add nothing to recall — dropped before a ref is emitted.
const REF_NOISE: &[&str] = &[
    "if", "else", "for", "while", "return", "true", "false", "null", "None", "self", "this", "super", "int", "i8",
    "i16", "i32", "i64", "i128", "u8", "u16", "u32", "u64", "u128", "f32", "f64", "bool", "char", "str", "void",
    "string", "float", "double", "byte", "short", "long", "usize", "isize", "String", "Bool", "Double", "Float",
    "Int", "Unit", "Any", "Nothing", "Boolean", "Long", "Short", "Byte",
];

fn comment_prefix(language: Language) -> &'static str {
    match language {
        Language::Python => "#",
        _ => "//",
    }
}

fn signature_terminator(language: Language) -> char {
    match language {
        Language::Python => ':',
        _ => '{',
    }
}

fn node_text<'a>(node: tree_sitter::Node, src: &'a str) -> &'a str {
    &src[node.byte_range()]
}

fn extract_signature(text: &str, terminator: char) -> String {
    let cut = text.find(terminator).unwrap_or(text.len());
    text[..cut].split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Walks contiguous leading comment siblings (no blank-line gap) and joins
/// them in source order. Covers `///`, `//!`, `/** */`, `#`-style doc blocks
/// across every language this chunker supports except Python, which keeps
/// its docstring inside the definition body (see `python_docstring`).
fn leading_doc_comment(node: tree_sitter::Node, src: &str) -> Option<String> {
    let mut comments = Vec::new();
    let mut current = node.prev_sibling();
    let mut expected_row = node.start_position().row;

    while let Some(c) = current {
        if !c.kind().contains("comment") {
            break;
        }
        if c.end_position().row + 1 < expected_row {
            break;
        }
        comments.push(node_text(c, src).trim().to_string());
        expected_row = c.start_position().row;
        current = c.prev_sibling();
    }

    if comments.is_empty() {
        return None;
    }
    comments.reverse();
    Some(comments.join("\n"))
}

/// Python convention: the first statement in a function/class body is a
/// bare string expression.
fn python_docstring(node: tree_sitter::Node, src: &str) -> Option<String> {
    let body = node.child_by_field_name("body")?;
    let first = body.named_child(0)?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let expr = first.named_child(0)?;
    if expr.kind() != "string" {
        return None;
    }
    Some(node_text(expr, src).trim().to_string())
}

fn docstring_for(node: tree_sitter::Node, language: Language, src: &str) -> Option<String> {
    if language == Language::Python {
        return python_docstring(node, src).or_else(|| leading_doc_comment(node, src));
    }
    leading_doc_comment(node, src)
}

/// Decorators/annotations directly above a definition (`@staticmethod`,
/// `@Override`), order-preserved. Only meaningful for the languages that
/// expose a dedicated `decorator` grammar node; silently empty elsewhere.
fn leading_decorators(node: tree_sitter::Node, src: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut current = node.prev_sibling();

    while let Some(c) = current {
        if c.kind().contains("decorator") {
            let text = node_text(c, src).trim();
            let name = text.trim_start_matches('@').split(['(', '.']).next().unwrap_or(text).trim();
            if !name.is_empty() {
                names.push(name.to_string());
            }
            current = c.prev_sibling();
        } else if c.kind().contains("comment") {
            current = c.prev_sibling();
        } else {
            break;
        }
    }
    names.reverse();
    names
}

fn is_exported(node: tree_sitter::Node, language: Language, symbol_name: &str, src: &str) -> bool {
    match language.export_marker() {
        ExportMarker::AlwaysExported => true,
        ExportMarker::CapitalizedName => symbol_name.chars().next().is_some_and(|c| c.is_uppercase()),
        ExportMarker::Keyword(kw) => {
            let text = node_text(node, src);
            let carries_keyword = text.split_whitespace().any(|w| w == kw);
            let wrapped_in_export = node.parent().is_some_and(|p| p.kind().contains("export"));
            carries_keyword || wrapped_in_export
        }
    }
}

fn compute_file_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// A best-effort scan for quoted substrings in already-isolated chunk text.
/// Only runs when `extract_string_literals` is enabled; approximate by
/// design (no per-grammar string-node query), since the feature defaults
/// off (spec open question on identifier/string-literal extraction).
fn scan_string_literals(text: &str) -> Vec<String> {
    let mut literals = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some((_, ch)) = chars.next() {
        if ch != '"' && ch != '\'' && ch != '`' {
            continue;
        }
        let quote = ch;
        let mut literal = String::new();
        let mut closed = false;
        for (_, c) in chars.by_ref() {
            if c == '\\' {
                continue;
            }
            if c == quote {
                closed = true;
                break;
            }
            literal.push(c);
        }
        if closed && !literal.is_empty() && literal.len() < 200 {
            literals.push(literal);
        }
    }
    literals
}

struct RawSymbol {
    start_line: u32,
    end_line: u32,
    start_byte: usize,
    end_byte: usize,
    kind: SymbolKind,
    name: String,
}

/// Finds the tightest other span that strictly contains `target`, by byte
/// range, used both for `parent_symbol_id` (class methods nest under their
/// class) and for reclassifying a bare function capture as a method.
fn find_parent(symbols: &[RawSymbol], idx: usize) -> Option<usize> {
    let target_start = symbols[idx].start_byte;
    let target_end = symbols[idx].end_byte;
    let mut best: Option<usize> = None;

    for (i, s) in symbols.iter().enumerate() {
        if i == idx {
            continue;
        }
        let contains = s.start_byte <= target_start && s.end_byte >= target_end;
        let strictly_larger = (s.end_byte - s.start_byte) > (target_end - target_start);
        if contains && strictly_larger {
            best = match best {
                None => Some(i),
                Some(b) => {
                    let b_span = symbols[b].end_byte - symbols[b].start_byte;
                    let s_span = s.end_byte - s.start_byte;
                    if s_span < b_span {
                        Some(i)
                    } else {
                        Some(b)
                    }
                }
            };
        }
    }
    best
}

/// Tree-sitter-backed implementation of [`ChunkerService`] (spec §4.3).
/// Locates top-level functions, classes, and methods per language,
/// extracts import/call references, and falls back to a single whole-file
/// block chunk when the grammar can't parse the content at all.
pub struct TreeSitterChunker {
    extract_identifier_refs: bool,
    extract_string_literals: bool,
}

impl TreeSitterChunker {
    pub fn new(extract_identifier_refs: bool, extract_string_literals: bool) -> Self {
        Self {
            extract_identifier_refs,
            extract_string_literals,
        }
    }

    fn ts_language(&self, language: Language) -> Option<tree_sitter::Language> {
        match language {
            Language::Rust => Some(tree_sitter_rust::LANGUAGE.into()),
            Language::Python => Some(tree_sitter_python::LANGUAGE.into()),
            Language::JavaScript => Some(tree_sitter_javascript::LANGUAGE.into()),
            Language::TypeScript => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            Language::Tsx => Some(tree_sitter_typescript::LANGUAGE_TSX.into()),
            Language::Go => Some(tree_sitter_go::LANGUAGE.into()),
            Language::Java => Some(tree_sitter_java::LANGUAGE.into()),
            Language::CSharp => Some(tree_sitter_c_sharp::LANGUAGE.into()),
            Language::Php => Some(tree_sitter_php::LANGUAGE_PHP.into()),
            Language::Swift => Some(tree_sitter_swift::LANGUAGE.into()),
            Language::Kotlin => Some(tree_sitter_kotlin_ng::LANGUAGE.into()),
            Language::Unknown => None,
        }
    }

    fn symbol_query_source(&self, language: Language) -> &'static str {
        match language {
            Language::Rust => {
                r#"
                (function_item name: (identifier) @name) @function
                (struct_item name: (type_identifier) @name) @class
                (impl_item type: (type_identifier) @name) @class
                "#
            }
            Language::Python => {
                r#"
                (function_definition name: (identifier) @name) @function
                (class_definition name: (identifier) @name) @class
                "#
            }
            Language::JavaScript | Language::TypeScript | Language::Tsx => {
                r#"
                (function_declaration name: (identifier) @name) @function
                (class_declaration name: (type_identifier) @name) @class
                (method_definition name: (property_identifier) @name) @method
                "#
            }
            Language::Go => {
                r#"
                (function_declaration name: (identifier) @name) @function
                (method_declaration name: (field_identifier) @name) @method
                (type_declaration (type_spec name: (type_identifier) @name type: (struct_type))) @class
                "#
            }
            Language::Java => {
                r#"
                (class_declaration name: (identifier) @name) @class
                (interface_declaration name: (identifier) @name) @class
                (enum_declaration name: (identifier) @name) @class
                (method_declaration name: (identifier) @name) @method
                (constructor_declaration name: (identifier) @name) @method
                "#
            }
            Language::CSharp => {
                r#"
                (class_declaration name: (identifier) @name) @class
                (interface_declaration name: (identifier) @name) @class
                (struct_declaration name: (identifier) @name) @class
                (enum_declaration name: (identifier) @name) @class
                (method_declaration name: (identifier) @name) @method
                (constructor_declaration name: (identifier) @name) @method
                "#
            }
            Language::Kotlin => {
                r#"
                (function_declaration (simple_identifier) @name) @function
                (class_declaration (type_identifier) @name) @class
                "#
            }
            Language::Swift => {
                r#"
                (function_declaration name: (simple_identifier) @name) @function
                (class_declaration declaration_kind: "class" name: (type_identifier) @name) @class
                (class_declaration declaration_kind: "struct" name: (type_identifier) @name) @class
                "#
            }
            Language::Php => {
                r#"
                (function_definition name: (name) @name) @function
                (method_declaration name: (name) @name) @method
                (class_declaration name: (name) @name) @class
                (interface_declaration name: (name) @name) @class
                "#
            }
            Language::Unknown => "",
        }
    }

    fn capture_to_symbol_kind(capture_name: &str) -> Option<SymbolKind> {
        match capture_name {
            "function" => Some(SymbolKind::Function),
            "class" => Some(SymbolKind::Class),
            "method" => Some(SymbolKind::Method),
            _ => None,
        }
    }

    fn reference_query_source(&self, language: Language) -> &'static str {
        match language {
            Language::Rust => {
                r#"
                (call_expression function: (identifier) @callee) @call
                (call_expression function: (field_expression) @callee) @method_call
                (call_expression function: (scoped_identifier) @callee) @call
                (macro_invocation macro: (identifier) @callee) @call
                (use_declaration argument: (_) @callee) @import
                (struct_expression name: (type_identifier) @callee) @type_ref
                "#
            }
            Language::Python => {
                r#"
                (call function: (identifier) @callee) @call
                (call function: (attribute) @callee) @method_call
                (import_statement name: (dotted_name) @callee) @import
                (import_from_statement module_name: (dotted_name) @callee) @import
                (import_from_statement name: (dotted_name) @callee) @import
                (decorator (identifier) @callee) @decorator
                (decorator (call function: (identifier) @callee)) @decorator
                "#
            }
            Language::JavaScript | Language::TypeScript | Language::Tsx => {
                r#"
                (call_expression function: (identifier) @callee) @call
                (call_expression function: (member_expression) @callee) @method_call
                (new_expression constructor: (identifier) @callee) @call
                (import_specifier name: (identifier) @callee) @import
                (import_statement source: (string) @callee) @import
                "#
            }
            Language::Go => {
                r#"
                (call_expression function: (identifier) @callee) @call
                (call_expression function: (selector_expression) @callee) @method_call
                (import_spec path: (interpreted_string_literal) @callee) @import
                (composite_literal type: (type_identifier) @callee) @type_ref
                "#
            }
            Language::Java => {
                r#"
                (method_invocation name: (identifier) @callee) @call
                (object_creation_expression type: (type_identifier) @callee) @call
                (import_declaration (scoped_identifier name: (identifier) @callee)) @import
                (import_declaration (identifier) @callee) @import
                (superclass (type_identifier) @callee) @type_ref
                "#
            }
            Language::CSharp => {
                r#"
                (invocation_expression function: (member_access_expression) @callee) @method_call
                (invocation_expression function: (identifier) @callee) @call
                (object_creation_expression type: (identifier) @callee) @call
                (using_directive (qualified_name) @callee) @import
                (using_directive (identifier) @callee) @import
                "#
            }
            Language::Kotlin => {
                r#"
                (call_expression (identifier) @callee) @call
                (call_expression (navigation_expression) @callee) @method_call
                (import_header (identifier) @callee) @import
                (user_type (identifier) @callee) @type_ref
                "#
            }
            Language::Swift => {
                r#"
                (call_expression (simple_identifier) @callee) @call
                (call_expression (navigation_expression) @callee) @method_call
                (import_declaration (identifier (simple_identifier) @callee)) @import
                (user_type (type_identifier) @callee) @type_ref
                "#
            }
            Language::Php => {
                r#"
                (function_call_expression function: (name) @callee) @call
                (member_call_expression) @method_call
                (scoped_call_expression) @method_call
                (object_creation_expression (name) @callee) @call
                (namespace_use_clause (qualified_name) @callee) @import
                "#
            }
            Language::Unknown => "",
        }
    }

    fn capture_to_ref_kind(&self, capture_name: &str) -> Option<RefKind> {
        match capture_name {
            "call" | "method_call" => Some(RefKind::Call),
            "import" => Some(RefKind::Import),
            "type_ref" | "decorator" => self.extract_identifier_refs.then_some(RefKind::Identifier),
            _ => None,
        }
    }

    fn fallback_parsed_file(&self, repo_id: &str, revision: &str, file_path: &str, content: &str) -> ParsedFile {
        warn!(file_path, "tree-sitter failed to parse file; falling back to whole-file block chunk");

        let extension = Path::new(file_path).extension().and_then(|e| e.to_str()).unwrap_or("").to_string();
        let file_hash = compute_file_hash(content);
        let end_line = content.lines().count().max(1) as u32;

        let chunk = ChunkBuilder::new(
            repo_id,
            revision,
            file_path,
            &extension,
            1,
            end_line,
            0,
            content.len(),
            ChunkKind::Block {
                block_kind: BlockKind::Unknown,
                owner_symbol_id: None,
            },
            format!("// {}", file_path),
            content,
            &file_hash,
        )
        .build();

        let file_row = FileRow::new(
            repo_id,
            revision,
            file_path,
            &extension,
            &file_hash,
            vec![],
            vec![],
            None,
            file_path,
        );

        ParsedFile {
            file_row,
            chunks: vec![chunk],
            refs: vec![],
        }
    }
}

impl Default for TreeSitterChunker {
    fn default() -> Self {
        Self::new(false, false)
    }
}

impl ChunkerService for TreeSitterChunker {
    fn supports_language(&self, language: Language) -> bool {
        language.is_known()
    }

    fn supported_languages(&self) -> Vec<Language> {
        Language::all_supported()
    }

    fn parse_file(
        &self,
        repo_id: &str,
        revision: &str,
        file_path: &str,
        content: &str,
    ) -> Result<ParsedFile, IndexError> {
        let language = Language::from_path(Path::new(file_path));
        let extension = Path::new(file_path).extension().and_then(|e| e.to_str()).unwrap_or("").to_string();

        let Some(ts_language) = self.ts_language(language) else {
            return Ok(self.fallback_parsed_file(repo_id, revision, file_path, content));
        };

        let mut parser = Parser::new();
        if parser.set_language(&ts_language).is_err() {
            return Ok(self.fallback_parsed_file(repo_id, revision, file_path, content));
        }

        let Some(tree) = parser.parse(content, None) else {
            return Ok(self.fallback_parsed_file(repo_id, revision, file_path, content));
        };

        let file_hash = compute_file_hash(content);
        let text_bytes = content.as_bytes();

        // Pass 1: collect every candidate symbol span.
        let mut raw_symbols: Vec<RawSymbol> = Vec::new();
        let symbol_query_source = self.symbol_query_source(language);
        if !symbol_query_source.is_empty() {
            if let Ok(query) = Query::new(&ts_language, symbol_query_source) {
                let capture_names: Vec<&str> = query.capture_names().to_vec();
                let mut cursor = QueryCursor::new();
                let mut matches_iter = cursor.matches(&query, tree.root_node(), text_bytes);

                while let Some(query_match) = matches_iter.next() {
                    let mut name: Option<String> = None;
                    let mut main_node = None;
                    let mut kind = None;

                    for capture in query_match.captures {
                        let capture_name = capture_names.get(capture.index as usize).copied().unwrap_or("");
                        if capture_name == "name" {
                            name = Some(node_text(capture.node, content).to_string());
                        } else if let Some(k) = Self::capture_to_symbol_kind(capture_name) {
                            main_node = Some(capture.node);
                            kind = Some(k);
                        }
                    }

                    if let (Some(node), Some(name), Some(kind)) = (main_node, name, kind) {
                        raw_symbols.push(RawSymbol {
                            start_line: node.start_position().row as u32 + 1,
                            end_line: node.end_position().row as u32 + 1,
                            start_byte: node.byte_range().start,
                            end_byte: node.byte_range().end,
                            kind,
                            name,
                        });
                    }
                }
            }
        }

        // A function textually nested inside a class/struct is a method.
        let parents: Vec<Option<usize>> = (0..raw_symbols.len()).map(|i| find_parent(&raw_symbols, i)).collect();
        for (i, parent) in parents.iter().enumerate() {
            if raw_symbols[i].kind == SymbolKind::Function {
                if let Some(p) = parent {
                    if raw_symbols[*p].kind == SymbolKind::Class {
                        raw_symbols[i].kind = SymbolKind::Method;
                    }
                }
            }
        }

        // Pass 2: extract references, gating identifier-only kinds behind the flag.
        let mut refs = Vec::new();
        let reference_query_source = self.reference_query_source(language);
        if !reference_query_source.is_empty() {
            if let Ok(query) = Query::new(&ts_language, reference_query_source) {
                let capture_names: Vec<&str> = query.capture_names().to_vec();
                let mut cursor = QueryCursor::new();
                let mut matches_iter = cursor.matches(&query, tree.root_node(), text_bytes);

                while let Some(query_match) = matches_iter.next() {
                    let mut callee: Option<(String, tree_sitter::Node)> = None;
                    let mut ref_kind: Option<RefKind> = None;

                    for capture in query_match.captures {
                        let capture_name = capture_names.get(capture.index as usize).copied().unwrap_or("");
                        if capture_name == "callee" {
                            callee = Some((node_text(capture.node, content).to_string(), capture.node));
                        } else if let Some(k) = self.capture_to_ref_kind(capture_name) {
                            ref_kind = Some(k);
                        }
                    }

                    let (Some((mut name, node)), Some(kind)) = (callee, ref_kind) else {
                        continue;
                    };

                    if kind == RefKind::Import {
                        name = normalize_import_path(&name);
                    }

                    if name.len() < 2 || REF_NOISE.contains(&name.as_str()) {
                        continue;
                    }

                    let start_line = node.start_position().row as u32 + 1;
                    let end_line = node.end_position().row as u32 + 1;
                    let line_text = content.lines().nth((start_line - 1) as usize).unwrap_or("").trim().to_string();

                    let mut reference = Ref::new(repo_id, revision, file_path, start_line, end_line, kind, &name, line_text);
                    if kind == RefKind::Import {
                        reference = reference.with_module_name(name);
                    }
                    refs.push(reference);
                }
            }
        }

        // Pass 3: build chunks, resolving parent_symbol_id and per-chunk identifiers.
        // `content_hash`/`symbol_id` depend only on (file_path, lines, context_header,
        // code_text), so they're computed up front for every symbol before any
        // chunk is built — parent lookups below don't depend on build order.
        let symbol_ids: Vec<String> = raw_symbols
            .iter()
            .map(|symbol| {
                let node = tree
                    .root_node()
                    .descendant_for_byte_range(symbol.start_byte, symbol.end_byte)
                    .unwrap_or_else(|| tree.root_node());
                let code_text = node_text(node, content);
                let context_header = format!("{} {} :: {}", comment_prefix(language), file_path, symbol.name);
                let content_hash = crate::domain::compute_content_hash(&context_header, code_text);
                crate::domain::compute_symbol_id(file_path, symbol.start_line, symbol.end_line, &content_hash)
            })
            .collect();

        let mut chunks: Vec<Chunk> = Vec::with_capacity(raw_symbols.len());

        for (i, symbol) in raw_symbols.iter().enumerate() {
            let node = tree
                .root_node()
                .descendant_for_byte_range(symbol.start_byte, symbol.end_byte)
                .unwrap_or_else(|| tree.root_node());

            let code_text = node_text(node, content).to_string();
            let context_header = format!("{} {} :: {}", comment_prefix(language), file_path, symbol.name);

            let parent_name = parents[i].map(|p| raw_symbols[p].name.clone());
            let qualname = match &parent_name {
                Some(p) => format!("{}.{}", p, symbol.name),
                None => symbol.name.clone(),
            };

            let called_names: Vec<String> = refs
                .iter()
                .filter(|r| r.ref_kind() == RefKind::Call && r.start_line() >= symbol.start_line && r.start_line() <= symbol.end_line)
                .map(|r| r.token_text().to_string())
                .collect();

            let mut identifiers = vec![symbol.name.clone()];
            for name in &called_names {
                if !identifiers.contains(name) {
                    identifiers.push(name.clone());
                }
            }

            let string_literals = if self.extract_string_literals {
                scan_string_literals(&code_text)
            } else {
                Vec::new()
            };

            let kind_enum = ChunkKind::Symbol {
                symbol_kind: symbol.kind,
                symbol_name: symbol.name.clone(),
                qualname,
                parent_symbol_id: parents[i].map(|p| symbol_ids[p].clone()),
                signature: Some(extract_signature(&code_text, signature_terminator(language))),
                docstring: docstring_for(node, language, content),
                is_exported: is_exported(node, language, &symbol.name, content),
                decorator_names: leading_decorators(node, content),
            };

            let chunk = ChunkBuilder::new(
                repo_id,
                revision,
                file_path,
                &extension,
                symbol.start_line,
                symbol.end_line,
                symbol.start_byte,
                symbol.end_byte,
                kind_enum,
                context_header,
                code_text,
                &file_hash,
            )
            .with_identifiers(identifiers)
            .with_called_names(called_names)
            .with_string_literals(string_literals)
            .build();

            chunks.push(chunk);
        }

        let imports: Vec<String> = {
            let mut seen = Vec::new();
            for r in refs.iter().filter(|r| r.ref_kind() == RefKind::Import) {
                let name = r.token_text().to_string();
                if !seen.contains(&name) {
                    seen.push(name);
                }
            }
            seen
        };

        let exports: Vec<String> = chunks
            .iter()
            .filter(|c| c.is_exported())
            .filter_map(|c| match c.kind() {
                ChunkKind::Symbol { parent_symbol_id: None, symbol_name, .. } => Some(symbol_name.clone()),
                _ => None,
            })
            .collect();

        let top_level_doc = tree
            .root_node()
            .named_child(0)
            .and_then(|first| docstring_for(first, language, content).or_else(|| leading_doc_comment(first, content)));

        let file_summary_text = match &top_level_doc {
            Some(doc) => format!("{}\n{}", file_path, doc),
            None => file_path.to_string(),
        };

        let file_row = FileRow::new(
            repo_id,
            revision,
            file_path,
            &extension,
            &file_hash,
            imports,
            exports,
            top_level_doc,
            file_summary_text,
        );

        Ok(ParsedFile { file_row, chunks, refs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker() -> TreeSitterChunker {
        TreeSitterChunker::default()
    }

    #[test]
    fn parses_rust_function_and_struct() {
        let content = "pub fn add(a: i32, b: i32) -> i32 {\n    a + b\n}\n\nstruct Point {\n    x: i32,\n}\n";
        let parsed = chunker().parse_file("repo", "rev1", "src/lib.rs", content).unwrap();

        assert_eq!(parsed.chunks.len(), 2);
        let func = parsed.chunks.iter().find(|c| c.symbol_name() == Some("add")).unwrap();
        assert_eq!(func.symbol_kind(), Some(SymbolKind::Function));
        assert!(func.is_exported());
    }

    #[test]
    fn marks_methods_nested_in_struct_impl() {
        let content = "struct Counter { n: i32 }\n\nimpl Counter {\n    pub fn increment(&mut self) {\n        self.n += 1;\n    }\n}\n";
        let parsed = chunker().parse_file("repo", "rev1", "src/lib.rs", content).unwrap();
        let increment = parsed.chunks.iter().find(|c| c.symbol_name() == Some("increment")).unwrap();
        assert_eq!(increment.symbol_kind(), Some(SymbolKind::Method));
    }

    #[test]
    fn extracts_python_docstring_and_decorator() {
        let content = "class Widget:\n    @staticmethod\n    def build():\n        \"\"\"Builds a widget.\"\"\"\n        return None\n";
        let parsed = chunker().parse_file("repo", "rev1", "widget.py", content).unwrap();
        let build = parsed.chunks.iter().find(|c| c.symbol_name() == Some("build")).unwrap();
        match build.kind() {
            ChunkKind::Symbol { docstring, decorator_names, parent_symbol_id, .. } => {
                assert_eq!(docstring.as_deref(), Some("\"\"\"Builds a widget.\"\"\""));
                assert_eq!(decorator_names, &vec!["staticmethod".to_string()]);
                assert!(parent_symbol_id.is_some());
            }
            _ => panic!("expected symbol chunk"),
        }
    }

    #[test]
    fn emits_import_refs_for_python() {
        let content = "import os\nfrom collections import OrderedDict\n\ndef main():\n    return os.getcwd()\n";
        let parsed = chunker().parse_file("repo", "rev1", "main.py", content).unwrap();
        assert!(parsed.refs.iter().any(|r| r.ref_kind() == RefKind::Import && r.token_text() == "os"));
        assert!(parsed.file_row.imports().contains(&"os".to_string()));
    }

    #[test]
    fn identifier_refs_are_gated_behind_flag() {
        let content = "fn make() -> Widget {\n    Widget {}\n}\n";
        let default_chunker = TreeSitterChunker::new(false, false);
        let parsed = default_chunker.parse_file("repo", "rev1", "w.rs", content).unwrap();
        assert!(!parsed.refs.iter().any(|r| r.ref_kind() == RefKind::Identifier));

        let enabled_chunker = TreeSitterChunker::new(true, false);
        let parsed = enabled_chunker.parse_file("repo", "rev1", "w.rs", content).unwrap();
        assert!(parsed.refs.iter().any(|r| r.ref_kind() == RefKind::Identifier && r.token_text() == "Widget"));
    }

    #[test]
    fn falls_back_to_block_chunk_when_language_unsupported() {
        let parsed = chunker().parse_file("repo", "rev1", "README.md", "# Title\n\nSome text.\n").unwrap();
        assert_eq!(parsed.chunks.len(), 1);
        match parsed.chunks[0].kind() {
            ChunkKind::Block { block_kind, owner_symbol_id } => {
                assert_eq!(*block_kind, BlockKind::Unknown);
                assert!(owner_symbol_id.is_none());
            }
            _ => panic!("expected block chunk"),
        }
    }

    #[test]
    fn string_literal_scan_is_off_by_default() {
        let content = "fn greet() {\n    let s = \"hello\";\n}\n";
        let parsed = chunker().parse_file("repo", "rev1", "g.rs", content).unwrap();
        let func = &parsed.chunks[0];
        assert!(func.string_literals().is_empty());
    }
}
