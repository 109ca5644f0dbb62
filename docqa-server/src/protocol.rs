//! JSON bodies exchanged with HTTP clients.

use docqa_rag::Citation;
use serde::{Deserialize, Serialize};

/// Identifier of an upload scope.
pub type SessionId = String;

/// Body of `POST /query`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    /// Session returned by `POST /upload`; a query without one has no document.
    #[serde(default)]
    pub session_id: Option<SessionId>,
}

/// Response of `POST /query`.
///
/// Every field is always present. `success: false` with a `message` reports
/// a failed external call; the request itself was well-formed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub success: bool,
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub sources: Vec<Citation>,
    #[serde(default)]
    pub message: String,
}

impl QueryResponse {
    pub fn answered(answer: String, sources: Vec<Citation>) -> Self {
        Self { success: true, answer, sources, message: String::new() }
    }

    pub fn failed(message: String) -> Self {
        Self { success: false, answer: String::new(), sources: Vec::new(), message }
    }
}

/// Response of a successful `POST /upload`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub filename: String,
    pub session_id: SessionId,
}

/// Body of every 4xx/5xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}
