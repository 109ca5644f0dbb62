//! Completion provider trait for generating answers from a prompt.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A single-prompt completion request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionRequest {
    /// The fully rendered prompt.
    pub prompt: String,
    /// Sampling temperature.
    pub temperature: f32,
}

/// A hosted language model that turns a prompt into generated text.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Generate text for `request`.
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;

    /// Model identifier used for requests.
    fn model(&self) -> &str;
}
