use serde::{Deserialize, Serialize};
use std::path::Path;

/// The syntactic languages the chunker knows how to parse. `Tsx` is kept
/// distinct from `TypeScript` because it selects a different tree-sitter
/// grammar (JSX syntax embedded in TypeScript), even though both report
/// `"typescript"` at the config/filter level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    JavaScript,
    TypeScript,
    Tsx,
    Python,
    Go,
    Rust,
    Java,
    CSharp,
    Kotlin,
    Swift,
    Php,
    Unknown,
}

impl Language {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "js" | "jsx" | "mjs" | "cjs" => Language::JavaScript,
            "ts" | "mts" | "cts" => Language::TypeScript,
            "tsx" => Language::Tsx,
            "py" | "pyi" => Language::Python,
            "go" => Language::Go,
            "rs" => Language::Rust,
            "java" => Language::Java,
            "cs" => Language::CSharp,
            "kt" | "kts" => Language::Kotlin,
            "swift" => Language::Swift,
            "php" => Language::Php,
            _ => Language::Unknown,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(Language::Unknown)
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "javascript" => Language::JavaScript,
            "typescript" => Language::TypeScript,
            "tsx" => Language::Tsx,
            "python" => Language::Python,
            "go" => Language::Go,
            "rust" => Language::Rust,
            "java" => Language::Java,
            "csharp" | "c#" => Language::CSharp,
            "kotlin" => Language::Kotlin,
            "swift" => Language::Swift,
            "php" => Language::Php,
            _ => Language::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Tsx => "tsx",
            Language::Python => "python",
            Language::Go => "go",
            Language::Rust => "rust",
            Language::Java => "java",
            Language::CSharp => "csharp",
            Language::Kotlin => "kotlin",
            Language::Swift => "swift",
            Language::Php => "php",
            Language::Unknown => "unknown",
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Language::Unknown)
    }

    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Language::JavaScript => &["js", "jsx", "mjs", "cjs"],
            Language::TypeScript => &["ts", "mts", "cts"],
            Language::Tsx => &["tsx"],
            Language::Python => &["py", "pyi"],
            Language::Go => &["go"],
            Language::Rust => &["rs"],
            Language::Java => &["java"],
            Language::CSharp => &["cs"],
            Language::Kotlin => &["kt", "kts"],
            Language::Swift => &["swift"],
            Language::Php => &["php"],
            Language::Unknown => &[],
        }
    }

    /// How the language signals that a definition is visible outside its
    /// enclosing module, used by the chunker's `is_exported` check.
    /// Go has no keyword: capitalized names are the export convention.
    pub fn export_marker(&self) -> ExportMarker {
        match self {
            Language::Go => ExportMarker::CapitalizedName,
            Language::JavaScript | Language::TypeScript | Language::Tsx => {
                ExportMarker::Keyword("export")
            }
            Language::Java | Language::CSharp | Language::Kotlin | Language::Swift => {
                ExportMarker::Keyword("public")
            }
            Language::Rust => ExportMarker::Keyword("pub"),
            Language::Python | Language::Php | Language::Unknown => ExportMarker::AlwaysExported,
        }
    }

    pub fn all_supported() -> Vec<Language> {
        vec![
            Language::JavaScript,
            Language::TypeScript,
            Language::Tsx,
            Language::Python,
            Language::Go,
            Language::Rust,
            Language::Java,
            Language::CSharp,
            Language::Kotlin,
            Language::Swift,
            Language::Php,
        ]
    }
}

/// How a language signals that a definition is visible outside its module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportMarker {
    Keyword(&'static str),
    CapitalizedName,
    AlwaysExported,
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_extension_covers_every_supported_language() {
        assert_eq!(Language::from_extension("rs"), Language::Rust);
        assert_eq!(Language::from_extension("py"), Language::Python);
        assert_eq!(Language::from_extension("js"), Language::JavaScript);
        assert_eq!(Language::from_extension("ts"), Language::TypeScript);
        assert_eq!(Language::from_extension("tsx"), Language::Tsx);
        assert_eq!(Language::from_extension("go"), Language::Go);
        assert_eq!(Language::from_extension("java"), Language::Java);
        assert_eq!(Language::from_extension("cs"), Language::CSharp);
        assert_eq!(Language::from_extension("kt"), Language::Kotlin);
        assert_eq!(Language::from_extension("swift"), Language::Swift);
        assert_eq!(Language::from_extension("php"), Language::Php);
        assert_eq!(Language::from_extension("txt"), Language::Unknown);
    }

    #[test]
    fn from_path_dispatches_on_extension() {
        assert_eq!(
            Language::from_path(Path::new("src/main.rs")),
            Language::Rust
        );
        assert_eq!(
            Language::from_path(Path::new("Widget.tsx")),
            Language::Tsx
        );
    }

    #[test]
    fn go_uses_capitalized_name_export_marker() {
        assert_eq!(Language::Go.export_marker(), ExportMarker::CapitalizedName);
    }

    #[test]
    fn all_supported_excludes_unknown() {
        let supported = Language::all_supported();
        assert!(supported.contains(&Language::Rust));
        assert!(supported.contains(&Language::Java));
        assert!(supported.contains(&Language::CSharp));
        assert!(!supported.contains(&Language::Unknown));
    }
}
