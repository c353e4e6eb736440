use serde::{Deserialize, Serialize};

/// Per-file summary row (spec §3 "File row").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRow {
    file_id: String,
    repo_id: String,
    revision: String,
    file_path: String,
    extension: String,
    file_hash: String,
    imports: Vec<String>,
    exports: Vec<String>,
    top_level_doc: Option<String>,
    file_summary_text: String,
    vec_file: Option<Vec<f32>>,
}

impl FileRow {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repo_id: impl Into<String>,
        revision: impl Into<String>,
        file_path: impl Into<String>,
        extension: impl Into<String>,
        file_hash: impl Into<String>,
        imports: Vec<String>,
        exports: Vec<String>,
        top_level_doc: Option<String>,
        file_summary_text: impl Into<String>,
    ) -> Self {
        let file_path = file_path.into();
        let repo_id = repo_id.into();
        let file_id = format!("{}::{}", repo_id, file_path);
        Self {
            file_id,
            repo_id,
            revision: revision.into(),
            file_path,
            extension: extension.into(),
            file_hash: file_hash.into(),
            imports,
            exports,
            top_level_doc,
            file_summary_text: file_summary_text.into(),
            vec_file: None,
        }
    }

    pub fn with_vector(mut self, vector: Vec<f32>) -> Self {
        self.vec_file = Some(vector);
        self
    }

    pub fn file_id(&self) -> &str {
        &self.file_id
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
    pub fn file_hash(&self) -> &str {
        &self.file_hash
    }
    pub fn imports(&self) -> &[String] {
        &self.imports
    }
    pub fn exports(&self) -> &[String] {
        &self.exports
    }
    pub fn top_level_doc(&self) -> Option<&str> {
        self.top_level_doc.as_deref()
    }
    pub fn file_summary_text(&self) -> &str {
        &self.file_summary_text
    }
    pub fn vector(&self) -> Option<&[f32]> {
        self.vec_file.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_id_is_namespaced_by_repo() {
        let row = FileRow::new(
            "repo-1", "rev-1", "src/lib.rs", "rs", "abc123", vec![], vec![], None, "summary",
        );
        assert_eq!(row.file_id(), "repo-1::src/lib.rs");
    }
}
