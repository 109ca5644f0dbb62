//! Error types for the `docqa-rag` crate.

use thiserror::Error;

/// Errors that can occur while indexing documents or answering questions.
#[derive(Debug, Error)]
pub enum RagError {
    /// The query was empty or otherwise unusable.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// An uploaded file was rejected before processing (wrong type, too large, missing).
    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    /// No index has been built for the requested scope yet.
    #[error("Index not ready: {0}")]
    IndexNotReady(String),

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
        /// Whether the failure is transient (rate limit, network, 5xx).
        retryable: bool,
    },

    /// An error occurred while calling the completion API.
    #[error("Completion error ({provider}): {message}")]
    CompletionError {
        /// The completion provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
        /// Whether the failure is transient (rate limit, network, 5xx).
        retryable: bool,
    },

    /// An error occurred in the vector index.
    #[error("Vector store error ({backend}): {message}")]
    VectorStoreError {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred during document chunking.
    #[error("Chunking error: {0}")]
    ChunkingError(String),

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An external call exceeded its time budget.
    #[error("{operation} timed out after {timeout_ms} ms")]
    Timeout {
        /// The operation that timed out (e.g. `embedding`, `completion`).
        operation: String,
        /// The timeout that was exceeded, in milliseconds.
        timeout_ms: u64,
    },

    /// A filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A (de)serialization error while reading or writing a persisted index.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RagError {
    /// Returns `true` for errors caused by caller input rather than system state.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidQuery(_) | Self::InvalidUpload(_))
    }

    /// Returns `true` for failures worth retrying once: timeouts and
    /// provider errors flagged as transient.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::EmbeddingError { retryable, .. } | Self::CompletionError { retryable, .. } => {
                *retryable
            }
            _ => false,
        }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        let timeout = RagError::Timeout { operation: "embedding".into(), timeout_ms: 10 };
        assert!(timeout.is_transient());

        let quota = RagError::CompletionError {
            provider: "OpenAI".into(),
            message: "429".into(),
            retryable: true,
        };
        assert!(quota.is_transient());

        let auth = RagError::EmbeddingError {
            provider: "OpenAI".into(),
            message: "401".into(),
            retryable: false,
        };
        assert!(!auth.is_transient());
        assert!(!RagError::InvalidQuery("empty".into()).is_transient());
    }

    #[test]
    fn only_query_errors_are_validation() {
        assert!(RagError::InvalidQuery("empty".into()).is_validation());
        assert!(RagError::InvalidUpload("notes.txt".into()).is_validation());
        assert!(!RagError::IndexNotReady("none".into()).is_validation());
        assert!(!RagError::ConfigError("bad".into()).is_validation());
    }
}
