//! Data types for documents and chunks, and the Markdown loader.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{RagError, Result};

/// Metadata key holding a document's source identifier (file path or upload name).
pub const SOURCE_KEY: &str = "source";

/// Metadata key holding a chunk's character offset in its document.
pub const START_INDEX_KEY: &str = "start_index";

/// Metadata key holding a chunk's position in its document's chunk sequence.
pub const CHUNK_INDEX_KEY: &str = "chunk_index";

/// A source document containing text content and metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier for the document.
    pub id: String,
    /// The text content of the document.
    pub text: String,
    /// Key-value metadata; always carries [`SOURCE_KEY`] once loaded.
    pub metadata: HashMap<String, String>,
}

impl Document {
    /// Create a document whose `source` is its id.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        let id = id.into();
        let metadata = HashMap::from([(SOURCE_KEY.to_string(), id.clone())]);
        Self { id, text: text.into(), metadata }
    }

    /// Add or replace a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The source identifier, if one was recorded.
    pub fn source(&self) -> Option<&str> {
        self.metadata.get(SOURCE_KEY).map(String::as_str)
    }

    /// Read a UTF-8 Markdown file. The path becomes both id and `source`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Io`] if the file cannot be read or is not valid UTF-8.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        debug!(path = %path.display(), bytes = text.len(), "loaded document");
        Ok(Self::new(path.display().to_string(), text))
    }
}

/// A contiguous slice of a [`Document`]'s text, the unit of retrieval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Unique identifier for the chunk (`{document_id}_{chunk_index}`).
    pub id: String,
    /// The text content of the chunk.
    pub text: String,
    /// Character offset of the chunk's first character in the document.
    pub start_index: usize,
    /// Metadata inherited from the parent document plus `start_index` and `chunk_index`.
    pub metadata: HashMap<String, String>,
    /// The ID of the parent [`Document`].
    pub document_id: String,
}

/// Returns `true` if `path` has a `.md` extension (case-insensitive).
pub fn is_markdown(path: impl AsRef<Path>) -> bool {
    path.as_ref().extension().is_some_and(|ext| ext.eq_ignore_ascii_case("md"))
}

/// Find every Markdown file under `dir`, sorted by path.
///
/// # Errors
///
/// Returns [`RagError::ConfigError`] if `dir` is not an existing directory.
pub fn discover_markdown_files(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(RagError::ConfigError(format!(
            "document directory '{}' does not exist",
            dir.display()
        )));
    }

    let mut files = WalkDir::new(dir)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| is_markdown(entry.path()))
        .map(|entry| entry.into_path())
        .collect::<Vec<_>>();

    files.sort();
    Ok(files)
}

/// Load every Markdown file under `dir` as a [`Document`].
///
/// # Errors
///
/// Fails on the first file that cannot be read; see [`discover_markdown_files`].
pub fn load_documents(dir: impl AsRef<Path>) -> Result<Vec<Document>> {
    let dir = dir.as_ref();
    let documents = discover_markdown_files(dir)?
        .iter()
        .map(Document::from_path)
        .collect::<Result<Vec<_>>>()?;
    info!(directory = %dir.display(), document_count = documents.len(), "loaded documents");
    Ok(documents)
}
