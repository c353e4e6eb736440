use crate::domain::{Chunk, FileRow, IndexError, Language, Ref};

/// Everything a single file parse produces (spec §4.2, §4.3).
#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub file_row: FileRow,
    pub chunks: Vec<Chunk>,
    pub refs: Vec<Ref>,
}

/// Turns source text into chunks, a file-level summary row, and references
/// (spec §3 "Chunk", §4.3 "Reference extraction").
pub trait ChunkerService: Send + Sync {
    fn supports_language(&self, language: Language) -> bool;

    fn supported_languages(&self) -> Vec<Language>;

    /// Parses one file. `revision` is the repo revision this parse belongs
    /// to, stamped onto every produced row.
    ///
    /// Falls back to a single whole-file `BlockKind::Unknown` chunk rather
    /// than failing when the grammar can't parse the content (spec §4.3
    /// "Parse failure handling").
    fn parse_file(
        &self,
        repo_id: &str,
        revision: &str,
        file_path: &str,
        content: &str,
    ) -> Result<ParsedFile, IndexError>;
}
