//! Deterministic in-process providers for tests and offline demos.
//!
//! Enabled with the `testing` feature. None of these call the network.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::completion::{CompletionProvider, CompletionRequest};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

/// Embeds text by hashing it with each dimension index.
///
/// Identical text always yields the identical vector (score 1.0); distinct
/// texts yield unrelated vectors.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok((0..self.dimensions)
            .map(|i| {
                let mut hasher = DefaultHasher::new();
                text.hash(&mut hasher);
                i.hash(&mut hasher);
                let unit = hasher.finish() as f64 / u64::MAX as f64;
                (unit * 2.0 - 1.0) as f32
            })
            .collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model(&self) -> &str {
        "hash-embedder"
    }
}

/// Embeds text onto one axis per topic: a component is 1.0 when the
/// lower-cased text contains any keyword of that topic.
///
/// Text sharing exactly one topic with a query scores 1.0 against it; text
/// with no topic in common scores 0.0.
#[derive(Debug, Clone)]
pub struct KeywordEmbedder {
    topics: Vec<Vec<String>>,
}

impl KeywordEmbedder {
    pub fn new<I, T, K>(topics: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            topics: topics
                .into_iter()
                .map(|keywords| keywords.into_iter().map(|k| k.into().to_lowercase()).collect())
                .collect(),
        }
    }

    /// The vector [`embed`](EmbeddingProvider::embed) returns for `text`.
    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let text = text.to_lowercase();
        self.topics
            .iter()
            .map(|keywords| if keywords.iter().any(|k| text.contains(k.as_str())) { 1.0 } else { 0.0 })
            .collect()
    }
}

impl Default for KeywordEmbedder {
    fn default() -> Self {
        Self::new([
            vec!["alice", "rabbit"],
            vec!["hatter", "tea", "hare"],
            vec!["queen", "croquet"],
            vec!["turtle", "gryphon"],
        ])
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.vector_for(text))
    }

    fn dimensions(&self) -> usize {
        self.topics.len()
    }

    fn model(&self) -> &str {
        "keyword-embedder"
    }
}

/// Completion provider that echoes the prompt and records every request.
#[derive(Debug, Default)]
pub struct RecordingCompletion {
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl RecordingCompletion {
    /// Number of completed calls.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every prompt received, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl CompletionProvider for RecordingCompletion {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap_or_else(PoisonError::into_inner).push(request.prompt.clone());
        Ok(format!("Echo: {}", request.prompt.trim()))
    }

    fn model(&self) -> &str {
        "recording-completion"
    }
}

/// Embedding provider whose every call fails.
#[derive(Debug)]
pub struct FailingEmbedder {
    retryable: bool,
    calls: AtomicUsize,
}

impl FailingEmbedder {
    /// Fails with an error the retry policy will not retry.
    pub fn permanent() -> Self {
        Self { retryable: false, calls: AtomicUsize::new(0) }
    }

    /// Fails with an error the retry policy treats as transient.
    pub fn transient() -> Self {
        Self { retryable: true, calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(RagError::EmbeddingError {
            provider: "failing".to_string(),
            message: "embedding service unavailable".to_string(),
            retryable: self.retryable,
        })
    }

    fn dimensions(&self) -> usize {
        8
    }

    fn model(&self) -> &str {
        "failing-embedder"
    }
}

/// Completion provider whose every call fails.
#[derive(Debug)]
pub struct FailingCompletion {
    retryable: bool,
    calls: AtomicUsize,
}

impl FailingCompletion {
    pub fn permanent() -> Self {
        Self { retryable: false, calls: AtomicUsize::new(0) }
    }

    pub fn transient() -> Self {
        Self { retryable: true, calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionProvider for FailingCompletion {
    async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(RagError::CompletionError {
            provider: "failing".to_string(),
            message: "completion service unavailable".to_string(),
            retryable: self.retryable,
        })
    }

    fn model(&self) -> &str {
        "failing-completion"
    }
}
