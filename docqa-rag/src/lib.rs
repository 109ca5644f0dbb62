//! Retrieval-augmented question answering over Markdown documents.
//!
//! This crate provides:
//! - Markdown discovery and loading
//! - Recursive character chunking with overlap
//! - A brute-force cosine vector index persisted as JSON
//! - Batched index builds and per-document scratch indexes
//! - A relevance-gated retrieval-answer pipeline with citations
//! - OpenAI embedding and chat completion providers

pub mod chunking;
pub mod completion;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod index;
pub mod indexer;
pub mod openai;
pub mod pipeline;
pub mod retry;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use chunking::{Chunker, RecursiveChunker};
pub use completion::{CompletionProvider, CompletionRequest};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{Chunk, Document, discover_markdown_files, is_markdown, load_documents};
pub use embedding::{EmbeddingProvider, cosine_similarity};
pub use error::{RagError, Result};
pub use index::{IndexEntry, SearchResult, VectorIndex};
pub use indexer::{IndexStats, Indexer, ScratchIndex};
pub use openai::{OpenAICompletionProvider, OpenAIEmbeddingProvider};
pub use pipeline::{
    Answer, AnswerOutcome, AnswerPipeline, AnswerPipelineBuilder, Citation,
    NO_RELEVANT_CONTEXT_ANSWER,
};
pub use retry::RetryPolicy;
