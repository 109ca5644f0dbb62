//! Configuration for indexing and answering.

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::retry::RetryPolicy;

/// Prompt used to ask the completion model for an answer.
///
/// `{context}` receives the retrieved chunks, `{question}` the user's query.
pub const DEFAULT_PROMPT_TEMPLATE: &str = "
Answer the question based on the following context:

{context}

---

Answer the question: {question}
";

/// Default embedding model for the OpenAI embeddings API.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Default chat model for the OpenAI chat completions API.
pub const DEFAULT_COMPLETION_MODEL: &str = "gpt-3.5-turbo";

/// Every recognised option of the indexing and answering pipeline.
///
/// Build one with [`RagConfig::builder`] to get validation; [`RagConfig::default`]
/// is always valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of results retrieved per query.
    pub top_k: usize,
    /// Minimum top similarity score required before an answer is generated.
    pub relevance_threshold: f32,
    /// Model identifier passed to the embeddings API.
    pub embedding_model_id: String,
    /// Model identifier passed to the completion API.
    pub completion_model_id: String,
    /// Sampling temperature for the completion API.
    pub temperature: f32,
    /// Number of chunk texts sent per embeddings request while indexing.
    pub embedding_batch_size: usize,
    /// Prompt template containing `{context}` and `{question}` placeholders.
    pub prompt_template: String,
    /// Timeout and retry policy for every external call.
    pub retry: RetryPolicy,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            top_k: 3,
            relevance_threshold: 0.7,
            embedding_model_id: DEFAULT_EMBEDDING_MODEL.to_string(),
            completion_model_id: DEFAULT_COMPLETION_MODEL.to_string(),
            temperature: 0.0,
            embedding_batch_size: 100,
            prompt_template: DEFAULT_PROMPT_TEMPLATE.to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Check that the parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `chunk_size == 0` or `chunk_overlap >= chunk_size`
    /// - `top_k == 0` or `embedding_batch_size == 0`
    /// - `relevance_threshold` is not finite
    /// - `temperature` is outside `0.0..=2.0`
    /// - a model id is blank
    /// - `prompt_template` lacks `{context}` or `{question}`
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::ConfigError("chunk_size must be greater than zero".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::ConfigError(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        if self.embedding_batch_size == 0 {
            return Err(RagError::ConfigError(
                "embedding_batch_size must be greater than zero".to_string(),
            ));
        }
        if !self.relevance_threshold.is_finite() {
            return Err(RagError::ConfigError("relevance_threshold must be finite".to_string()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(RagError::ConfigError(format!(
                "temperature ({}) must be between 0.0 and 2.0",
                self.temperature
            )));
        }
        if self.embedding_model_id.trim().is_empty() {
            return Err(RagError::ConfigError("embedding_model_id must not be empty".to_string()));
        }
        if self.completion_model_id.trim().is_empty() {
            return Err(RagError::ConfigError("completion_model_id must not be empty".to_string()));
        }
        for placeholder in ["{context}", "{question}"] {
            if !self.prompt_template.contains(placeholder) {
                return Err(RagError::ConfigError(format!(
                    "prompt_template must contain {placeholder}"
                )));
            }
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of results retrieved per query.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the relevance gate threshold.
    pub fn relevance_threshold(mut self, threshold: f32) -> Self {
        self.config.relevance_threshold = threshold;
        self
    }

    /// Set the embeddings model identifier.
    pub fn embedding_model_id(mut self, model: impl Into<String>) -> Self {
        self.config.embedding_model_id = model.into();
        self
    }

    /// Set the completion model identifier.
    pub fn completion_model_id(mut self, model: impl Into<String>) -> Self {
        self.config.completion_model_id = model.into();
        self
    }

    /// Set the completion sampling temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    /// Set how many chunk texts go into a single embeddings request.
    pub fn embedding_batch_size(mut self, size: usize) -> Self {
        self.config.embedding_batch_size = size;
        self
    }

    /// Replace the prompt template.
    pub fn prompt_template(mut self, template: impl Into<String>) -> Self {
        self.config.prompt_template = template.into();
        self
    }

    /// Set the timeout and retry policy for external calls.
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.config.retry = retry;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
