use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of occurrence a `Ref` captures (spec §3 "Ref", GLOSSARY).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefKind {
    Import,
    Call,
    Identifier,
}

impl RefKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefKind::Import => "import",
            RefKind::Call => "call",
            RefKind::Identifier => "identifier",
        }
    }
}

impl std::fmt::Display for RefKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An occurrence of a name in code: an import, a call site (including
/// member calls, which also store the qualified `receiver.method` form),
/// or (when the feature flag is enabled) a bare identifier reference.
/// Refs are never emitted for tokens inside comments or string literals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ref {
    ref_id: String,
    repo_id: String,
    revision: String,
    file_path: String,
    start_line: u32,
    end_line: u32,
    ref_kind: RefKind,
    token_text: String,
    context_snippet: String,
    module_name: Option<String>,
    imported_name: Option<String>,
}

impl Ref {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repo_id: impl Into<String>,
        revision: impl Into<String>,
        file_path: impl Into<String>,
        start_line: u32,
        end_line: u32,
        ref_kind: RefKind,
        token_text: impl Into<String>,
        context_snippet: impl Into<String>,
    ) -> Self {
        Self {
            ref_id: Uuid::new_v4().to_string(),
            repo_id: repo_id.into(),
            revision: revision.into(),
            file_path: file_path.into(),
            start_line,
            end_line,
            ref_kind,
            token_text: token_text.into(),
            context_snippet: context_snippet.into(),
            module_name: None,
            imported_name: None,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        ref_id: String,
        repo_id: String,
        revision: String,
        file_path: String,
        start_line: u32,
        end_line: u32,
        ref_kind: RefKind,
        token_text: String,
        context_snippet: String,
        module_name: Option<String>,
        imported_name: Option<String>,
    ) -> Self {
        Self {
            ref_id,
            repo_id,
            revision,
            file_path,
            start_line,
            end_line,
            ref_kind,
            token_text,
            context_snippet,
            module_name,
            imported_name,
        }
    }

    pub fn with_module_name(mut self, module_name: impl Into<String>) -> Self {
        self.module_name = Some(module_name.into());
        self
    }

    pub fn with_imported_name(mut self, imported_name: impl Into<String>) -> Self {
        self.imported_name = Some(imported_name.into());
        self
    }

    pub fn ref_id(&self) -> &str {
        &self.ref_id
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
    pub fn start_line(&self) -> u32 {
        self.start_line
    }
    pub fn end_line(&self) -> u32 {
        self.end_line
    }
    pub fn ref_kind(&self) -> RefKind {
        self.ref_kind
    }
    pub fn token_text(&self) -> &str {
        &self.token_text
    }
    pub fn context_snippet(&self) -> &str {
        &self.context_snippet
    }
    pub fn module_name(&self) -> Option<&str> {
        self.module_name.as_deref()
    }
    pub fn imported_name(&self) -> Option<&str> {
        self.imported_name.as_deref()
    }

    /// True if `name` matches this ref's token either exactly, or as the
    /// trailing component of a qualified `receiver.method` call
    /// (spec §4.9 `usage`: "token_text = symbol_name or whose qualified
    /// form ends with `.symbol_name`").
    pub fn matches_symbol(&self, name: &str) -> bool {
        self.token_text == name || self.token_text.ends_with(&format!(".{}", name))
    }

    pub fn location(&self) -> String {
        format!("{}:{}-{}", self.file_path, self.start_line, self.end_line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_ref(token: &str) -> Ref {
        Ref::new("repo", "rev", "f.rs", 1, 1, RefKind::Call, token, "ctx")
    }

    #[test]
    fn matches_exact_token() {
        assert!(make_ref("login").matches_symbol("login"));
        assert!(!make_ref("logout").matches_symbol("login"));
    }

    #[test]
    fn matches_qualified_suffix() {
        assert!(make_ref("auth.login").matches_symbol("login"));
        assert!(!make_ref("auth.login").matches_symbol("auth"));
    }
}
