//! Retrieval-answer pipeline.
//!
//! [`AnswerPipeline`] turns a raw question into a cited answer:
//! validate → embed → search → relevance gate → build context → complete.
//! The gate looks only at the best score; when it fails, the completion API
//! is never called and a fixed answer with no sources is returned.
//!
//! # Example
//!
//! ```rust,ignore
//! use docqa_rag::{AnswerPipeline, RagConfig, VectorIndex};
//!
//! let pipeline = AnswerPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(embedder))
//!     .completion_provider(Arc::new(completion))
//!     .build()?;
//!
//! let index = VectorIndex::load("chroma").await?;
//! let answer = pipeline.answer(&index, "How does Alice meet the Mad Hatter?").await?;
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::completion::{CompletionProvider, CompletionRequest};
use crate::config::RagConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::index::{SearchResult, VectorIndex};

/// Answer returned when no retrieved chunk clears the relevance threshold.
pub const NO_RELEVANT_CONTEXT_ANSWER: &str =
    "Unable to find relevant information in the document to answer your question.";

/// Separator placed between chunk texts in the prompt context.
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Number of characters of a chunk shown in a citation preview.
pub const PREVIEW_CHARS: usize = 200;

/// How a query was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerOutcome {
    /// Context passed the gate and the completion API produced the text.
    Answered,
    /// Nothing relevant was retrieved; the text is [`NO_RELEVANT_CONTEXT_ANSWER`].
    NoRelevantContext,
}

/// A retrieved chunk cited in an [`Answer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// Source identifier of the chunk's document.
    pub source: String,
    /// Similarity between the query and the chunk.
    pub score: f32,
    /// Leading characters of the chunk text, with `...` appended if truncated.
    #[serde(rename = "content")]
    pub preview: String,
    /// Chunk metadata.
    pub metadata: HashMap<String, String>,
}

impl Citation {
    fn from_result(result: &SearchResult) -> Self {
        Self {
            source: result.entry.source().to_string(),
            score: result.score,
            preview: preview(&result.entry.text),
            metadata: result.entry.metadata.clone(),
        }
    }
}

/// The result of answering a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    /// Generated (or canned) answer text.
    pub text: String,
    /// Citations for every retrieved chunk, most relevant first.
    pub sources: Vec<Citation>,
    /// Whether the completion model was consulted.
    pub outcome: AnswerOutcome,
}

impl Answer {
    /// The gated-out answer: canned text and no sources.
    pub fn no_relevant_context() -> Self {
        Self {
            text: NO_RELEVANT_CONTEXT_ANSWER.to_string(),
            sources: Vec::new(),
            outcome: AnswerOutcome::NoRelevantContext,
        }
    }

    /// `true` unless the question was gated out.
    pub fn is_answered(&self) -> bool {
        self.outcome == AnswerOutcome::Answered
    }
}

/// First [`PREVIEW_CHARS`] characters of `text`, plus `...` when longer.
pub fn preview(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((byte, _)) => format!("{}...", &text[..byte]),
        None => text.to_string(),
    }
}

/// Join chunk texts in result order with [`CONTEXT_SEPARATOR`].
pub fn build_context(results: &[SearchResult]) -> String {
    results.iter().map(|r| r.entry.text.as_str()).collect::<Vec<_>>().join(CONTEXT_SEPARATOR)
}

/// Substitute `{context}` and `{question}` into `template`.
///
/// Placeholders appearing inside the substituted values are left alone.
pub fn render_prompt(template: &str, context: &str, question: &str) -> String {
    template
        .split("{context}")
        .map(|part| part.replace("{question}", question))
        .collect::<Vec<_>>()
        .join(context)
}

/// Answers questions against a [`VectorIndex`].
///
/// Construct one via [`AnswerPipeline::builder()`].
pub struct AnswerPipeline {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    completion_provider: Arc<dyn CompletionProvider>,
}

impl AnswerPipeline {
    /// Create a new [`AnswerPipelineBuilder`].
    pub fn builder() -> AnswerPipelineBuilder {
        AnswerPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the embedding provider.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    /// Reject empty or whitespace-only queries.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidQuery`].
    pub fn validate_query(query: &str) -> Result<&str> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Err(RagError::InvalidQuery("Query cannot be empty".to_string()));
        }
        Ok(trimmed)
    }

    /// Embed `query` and return the top `k` results, most relevant first.
    pub async fn retrieve(&self, index: &VectorIndex, query: &str) -> Result<Vec<SearchResult>> {
        let embedding = self
            .config
            .retry
            .run("embedding", || self.embedding_provider.embed(query))
            .await
            .map_err(|e| {
                error!(error = %e, "embedding failed during query");
                e
            })?;

        index.search(&embedding, self.config.top_k)
    }

    /// Answer `query` from `index`.
    ///
    /// # Errors
    ///
    /// - [`RagError::InvalidQuery`] for an empty query
    /// - embedding, search or completion failures, after retries
    pub async fn answer(&self, index: &VectorIndex, query: &str) -> Result<Answer> {
        let query = Self::validate_query(query)?;
        let results = self.retrieve(index, query).await?;

        let top_score = results.first().map(|r| r.score);
        match top_score {
            Some(score) if score >= self.config.relevance_threshold => {}
            _ => {
                info!(
                    result_count = results.len(),
                    top_score = ?top_score,
                    threshold = self.config.relevance_threshold,
                    "no relevant context"
                );
                return Ok(Answer::no_relevant_context());
            }
        }

        let context = build_context(&results);
        let prompt = render_prompt(&self.config.prompt_template, &context, query);
        debug!(prompt_len = prompt.len(), result_count = results.len(), "built prompt");

        let request = CompletionRequest { prompt, temperature: self.config.temperature };
        let text = self
            .config
            .retry
            .run("completion", || self.completion_provider.complete(&request))
            .await
            .map_err(|e| {
                error!(error = %e, "completion failed");
                e
            })?;

        let sources: Vec<Citation> = results.iter().map(Citation::from_result).collect();
        info!(source_count = sources.len(), top_score = ?top_score, "answered query");

        Ok(Answer { text, sources, outcome: AnswerOutcome::Answered })
    }

    /// Answer `query` from the index persisted at `location`.
    ///
    /// The query is validated before the index is opened.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IndexNotReady`] if nothing has been indexed at `location`.
    pub async fn answer_persisted(
        &self,
        location: impl AsRef<Path>,
        query: &str,
    ) -> Result<Answer> {
        Self::validate_query(query)?;
        let index = VectorIndex::load(location).await?;
        self.answer(&index, query).await
    }
}

/// Builder for constructing an [`AnswerPipeline`].
///
/// `config` defaults to [`RagConfig::default`]; both providers are required.
#[derive(Default)]
pub struct AnswerPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    completion_provider: Option<Arc<dyn CompletionProvider>>,
}

impl AnswerPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider. Must match the one the index was built with.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the completion provider.
    pub fn completion_provider(mut self, provider: Arc<dyn CompletionProvider>) -> Self {
        self.completion_provider = Some(provider);
        self
    }

    /// Build the [`AnswerPipeline`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a provider is missing or the
    /// configuration is invalid.
    pub fn build(self) -> Result<AnswerPipeline> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let completion_provider = self
            .completion_provider
            .ok_or_else(|| RagError::ConfigError("completion_provider is required".to_string()))?;

        Ok(AnswerPipeline { config, embedding_provider, completion_provider })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexEntry;
    use crate::testing::{FailingCompletion, KeywordEmbedder, RecordingCompletion};

    fn alice_index(embedder: &KeywordEmbedder) -> VectorIndex {
        let mut index = VectorIndex::new(embedder.dimensions(), "keyword");
        for (id, text) in [
            ("alice_0", "Alice followed the White Rabbit down the hole."),
            ("tea_0", "The Hatter poured tea for the March Hare."),
        ] {
            index
                .push(IndexEntry {
                    id: id.to_string(),
                    text: text.to_string(),
                    metadata: HashMap::from([("source".to_string(), format!("{id}.md"))]),
                    embedding: embedder.vector_for(text),
                })
                .unwrap();
        }
        index
    }

    fn pipeline(completion: Arc<dyn CompletionProvider>) -> AnswerPipeline {
        AnswerPipeline::builder()
            .embedding_provider(Arc::new(KeywordEmbedder::default()))
            .completion_provider(completion)
            .build()
            .unwrap()
    }

    #[test]
    fn prompt_substitutes_both_placeholders_once() {
        let prompt = render_prompt("C={context}|Q={question}", "ctx {question}", "why {context}?");
        assert_eq!(prompt, "C=ctx {question}|Q=why {context}?");
    }

    #[test]
    fn preview_truncates_long_text() {
        assert_eq!(preview("short"), "short");
        let long = "é".repeat(250);
        let p = preview(&long);
        assert!(p.ends_with("..."));
        assert_eq!(p.chars().count(), PREVIEW_CHARS + 3);
        assert_eq!(preview(&"x".repeat(200)), "x".repeat(200));
    }

    #[tokio::test]
    async fn gated_query_never_calls_completion() {
        let completion = Arc::new(RecordingCompletion::default());
        let embedder = KeywordEmbedder::default();
        let answer = pipeline(completion.clone())
            .answer(&alice_index(&embedder), "What is the capital of France?")
            .await
            .unwrap();

        assert_eq!(answer, Answer::no_relevant_context());
        assert_eq!(completion.calls(), 0);
    }

    #[tokio::test]
    async fn empty_index_is_gated_even_with_foreign_dimensions() {
        let completion = Arc::new(RecordingCompletion::default());
        let empty = VectorIndex::new(1536, "text-embedding-3-small");
        let answer = pipeline(completion.clone()).answer(&empty, "Who did Alice follow?").await.unwrap();

        assert_eq!(answer, Answer::no_relevant_context());
        assert_eq!(completion.calls(), 0);
    }

    #[tokio::test]
    async fn empty_query_is_rejected() {
        let completion = Arc::new(RecordingCompletion::default());
        let embedder = KeywordEmbedder::default();
        let err = pipeline(completion.clone())
            .answer(&alice_index(&embedder), "   ")
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::InvalidQuery(_)));
        assert_eq!(completion.calls(), 0);
    }

    #[tokio::test]
    async fn relevant_query_is_answered_with_citations() {
        let completion = Arc::new(RecordingCompletion::default());
        let embedder = KeywordEmbedder::default();
        let answer = pipeline(completion.clone())
            .answer(&alice_index(&embedder), "Who did Alice follow?")
            .await
            .unwrap();

        assert!(answer.is_answered());
        assert!(answer.text.contains("White Rabbit"));
        assert_eq!(answer.sources[0].source, "alice_0.md");
        assert_eq!(completion.calls(), 1);

        let prompt = &completion.prompts()[0];
        assert!(prompt.contains("Answer the question: Who did Alice follow?"));
        assert!(prompt.contains(CONTEXT_SEPARATOR));
    }

    #[tokio::test(start_paused = true)]
    async fn completion_failure_is_surfaced() {
        let embedder = KeywordEmbedder::default();
        let err = pipeline(Arc::new(FailingCompletion::transient()))
            .answer(&alice_index(&embedder), "Who did Alice follow?")
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::CompletionError { .. }));
    }

    #[tokio::test]
    async fn missing_persisted_index_is_not_ready() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(Arc::new(RecordingCompletion::default()));

        let err = pipeline.answer_persisted(dir.path(), "Who is Alice?").await.unwrap_err();
        assert!(matches!(err, RagError::IndexNotReady(_)));

        let err = pipeline.answer_persisted(dir.path(), "").await.unwrap_err();
        assert!(matches!(err, RagError::InvalidQuery(_)));
    }
}
