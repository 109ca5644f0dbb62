//! Index construction: chunk → embed (batched) → persist.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use tracing::{debug, error, info};

use crate::chunking::{Chunker, RecursiveChunker};
use crate::config::RagConfig;
use crate::document::{Chunk, Document};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::index::{IndexEntry, VectorIndex};

/// Summary of a completed index build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexStats {
    /// Number of documents chunked.
    pub documents: usize,
    /// Number of chunks embedded and stored.
    pub chunks: usize,
    /// Directory the index was written to.
    pub location: PathBuf,
}

/// A single-document index living in its own temporary directory.
///
/// The directory and everything in it is removed when this value is dropped.
#[derive(Debug)]
pub struct ScratchIndex {
    dir: TempDir,
    index: VectorIndex,
}

impl ScratchIndex {
    /// The in-memory index.
    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Directory holding the persisted copy.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// Builds [`VectorIndex`]es from documents.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{Indexer, RagConfig, load_documents};
///
/// let indexer = Indexer::new(RagConfig::default(), Arc::new(embedder))?;
/// let stats = indexer.build_index(&load_documents("data/books")?, "chroma").await?;
/// ```
pub struct Indexer {
    config: RagConfig,
    chunker: RecursiveChunker,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl Indexer {
    /// Create an indexer using the chunking and batching settings of `config`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `config` is invalid.
    pub fn new(config: RagConfig, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        config.validate()?;
        let chunker = RecursiveChunker::from_config(&config)?;
        Ok(Self { config, chunker, embedder })
    }

    /// Configuration this indexer was built with.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Chunk and embed `documents` into a fresh in-memory index.
    ///
    /// Entries keep document order, then chunk order within each document.
    ///
    /// # Errors
    ///
    /// Embedding failures are returned as-is after the retry policy gives up.
    pub async fn embed_documents(&self, documents: &[Document]) -> Result<VectorIndex> {
        let chunks: Vec<Chunk> = documents.iter().flat_map(|d| self.chunker.chunk(d)).collect();
        info!(document_count = documents.len(), chunk_count = chunks.len(), "split documents");

        if let Some(sample) = chunks.get(chunks.len() / 2) {
            debug!(chunk.id = %sample.id, text = %sample.text, metadata = ?sample.metadata, "sample chunk");
        }

        let mut embeddings = Vec::with_capacity(chunks.len());
        for (batch_number, batch) in chunks.chunks(self.config.embedding_batch_size).enumerate() {
            let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
            let vectors = self
                .config
                .retry
                .run("embedding", || self.embedder.embed_batch(&texts))
                .await
                .map_err(|e| {
                    error!(batch = batch_number, error = %e, "embedding failed during indexing");
                    e
                })?;

            if vectors.len() != texts.len() {
                return Err(RagError::EmbeddingError {
                    provider: self.embedder.model().to_string(),
                    message: format!(
                        "expected {} embeddings in batch {batch_number}, got {}",
                        texts.len(),
                        vectors.len()
                    ),
                    retryable: false,
                });
            }
            debug!(batch = batch_number, size = vectors.len(), "embedded batch");
            embeddings.extend(vectors);
        }

        let dimensions = embeddings.first().map_or_else(|| self.embedder.dimensions(), Vec::len);
        let mut index = VectorIndex::new(dimensions, self.embedder.model());
        for (chunk, embedding) in chunks.into_iter().zip(embeddings) {
            index.push(IndexEntry {
                id: chunk.id,
                text: chunk.text,
                metadata: chunk.metadata,
                embedding,
            })?;
        }
        Ok(index)
    }

    /// Rebuild the index at `location` from `documents`.
    ///
    /// Any existing index there is deleted, but only after every chunk has
    /// been embedded; a failed build leaves the old index untouched.
    pub async fn build_index(
        &self,
        documents: &[Document],
        location: impl AsRef<Path>,
    ) -> Result<IndexStats> {
        let location = location.as_ref();
        let index = self.embed_documents(documents).await?;

        match tokio::fs::remove_dir_all(location).await {
            Ok(()) => info!(path = %location.display(), "removed previous index"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        index.save(location).await?;

        let stats = IndexStats {
            documents: documents.len(),
            chunks: index.len(),
            location: location.to_path_buf(),
        };
        info!(
            documents = stats.documents,
            chunks = stats.chunks,
            path = %location.display(),
            "built index"
        );
        Ok(stats)
    }

    /// Index a single document into a fresh temporary directory.
    pub async fn build_scratch_index(&self, document: &Document) -> Result<ScratchIndex> {
        let index = self.embed_documents(std::slice::from_ref(document)).await?;
        let dir = tempfile::Builder::new().prefix("docqa-index-").tempdir()?;
        index.save(dir.path()).await?;
        info!(
            document.id = %document.id,
            chunks = index.len(),
            path = %dir.path().display(),
            "built scratch index"
        );
        Ok(ScratchIndex { dir, index })
    }
}
