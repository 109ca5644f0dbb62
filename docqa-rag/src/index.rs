//! Brute-force cosine vector index, persisted as a single JSON file.
//!
//! [`VectorIndex`] keeps entries in insertion order and scores every entry
//! on each search. Equal scores keep their insertion order, so results are
//! deterministic for a given index.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::document::SOURCE_KEY;
use crate::embedding::cosine_similarity;
use crate::error::{RagError, Result};

/// File name of the persisted index inside its directory.
pub const INDEX_FILE: &str = "index.json";

/// On-disk format version written by [`VectorIndex::save`].
pub const INDEX_VERSION: u32 = 1;

const BACKEND: &str = "json";

/// An embedded chunk stored in the index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    /// Chunk identifier.
    pub id: String,
    /// Chunk text.
    pub text: String,
    /// Chunk metadata (`source`, `start_index`, `chunk_index`, ...).
    pub metadata: HashMap<String, String>,
    /// Embedding of `text`.
    pub embedding: Vec<f32>,
}

impl IndexEntry {
    /// The source identifier of the originating document, or `"unknown"`.
    pub fn source(&self) -> &str {
        self.metadata.get(SOURCE_KEY).map_or("unknown", String::as_str)
    }
}

/// A search hit with its cosine similarity score.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    /// The matching entry.
    pub entry: IndexEntry,
    /// Cosine similarity in `[-1, 1]`; higher is more relevant.
    pub score: f32,
}

/// An ordered collection of embedded chunks of one fixed dimensionality.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::VectorIndex;
///
/// let index = VectorIndex::load("chroma").await?;
/// let hits = index.search(&query_embedding, 3)?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorIndex {
    version: u32,
    dimensions: usize,
    embedding_model: String,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Create an empty index for vectors of `dimensions` produced by `embedding_model`.
    pub fn new(dimensions: usize, embedding_model: impl Into<String>) -> Self {
        Self {
            version: INDEX_VERSION,
            dimensions,
            embedding_model: embedding_model.into(),
            entries: Vec::new(),
        }
    }

    /// Append an entry.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::VectorStoreError`] if the embedding has the wrong length.
    pub fn push(&mut self, entry: IndexEntry) -> Result<()> {
        if entry.embedding.len() != self.dimensions {
            return Err(dimension_mismatch(self.dimensions, entry.embedding.len()));
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Vector dimensionality accepted by this index.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Model that produced the stored embeddings.
    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Return up to `top_k` entries ordered by descending similarity to `query`.
    ///
    /// Ties keep insertion order. An empty index matches nothing, whatever
    /// the query's dimensionality.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::VectorStoreError`] if `query` has the wrong dimensionality.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchResult>> {
        if self.entries.is_empty() {
            return Ok(Vec::new());
        }
        if query.len() != self.dimensions {
            return Err(dimension_mismatch(self.dimensions, query.len()));
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (i, cosine_similarity(&entry.embedding, query)))
            .collect();

        // sort_by is stable: equal scores stay in insertion order.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(top_k);

        debug!(candidates = self.entries.len(), returned = scored.len(), "searched index");

        Ok(scored
            .into_iter()
            .map(|(i, score)| SearchResult { entry: self.entries[i].clone(), score })
            .collect())
    }

    /// Path of the index file inside `dir`.
    pub fn file_path(dir: impl AsRef<Path>) -> PathBuf {
        dir.as_ref().join(INDEX_FILE)
    }

    /// Returns `true` if `dir` holds a persisted index.
    pub async fn exists(dir: impl AsRef<Path>) -> bool {
        tokio::fs::try_exists(Self::file_path(dir)).await.unwrap_or(false)
    }

    /// Write the index to `dir/index.json`, creating `dir` if needed.
    ///
    /// The file is written under a temporary name and renamed into place, so
    /// readers never observe a half-written index.
    pub async fn save(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir).await?;

        let bytes = serde_json::to_vec(self)?;
        let target = Self::file_path(dir);
        let staging = dir.join(format!("{INDEX_FILE}.tmp"));
        tokio::fs::write(&staging, &bytes).await?;
        tokio::fs::rename(&staging, &target).await?;

        info!(path = %target.display(), entries = self.entries.len(), bytes = bytes.len(), "saved index");
        Ok(())
    }

    /// Read the index persisted in `dir`.
    ///
    /// # Errors
    ///
    /// - [`RagError::IndexNotReady`] if `dir` holds no index
    /// - [`RagError::VectorStoreError`] if the file has an unsupported version
    /// - [`RagError::Serialization`] if the file is corrupt
    pub async fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let path = Self::file_path(dir);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(RagError::IndexNotReady(format!(
                    "no index found at '{}'",
                    path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };

        let index: Self = serde_json::from_slice(&bytes)?;
        if index.version != INDEX_VERSION {
            return Err(RagError::VectorStoreError {
                backend: BACKEND.to_string(),
                message: format!(
                    "unsupported index version {} (expected {INDEX_VERSION})",
                    index.version
                ),
            });
        }
        if let Some(bad) = index.entries.iter().find(|e| e.embedding.len() != index.dimensions) {
            return Err(RagError::VectorStoreError {
                backend: BACKEND.to_string(),
                message: format!("entry '{}' does not match index dimensions", bad.id),
            });
        }

        info!(path = %path.display(), entries = index.entries.len(), "loaded index");
        Ok(index)
    }
}

fn dimension_mismatch(expected: usize, actual: usize) -> RagError {
    RagError::VectorStoreError {
        backend: BACKEND.to_string(),
        message: format!("expected {expected}-dimensional vector, got {actual}"),
    }
}
