//! Per-session store of uploaded-document indexes.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use docqa_rag::ScratchIndex;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::protocol::SessionId;

/// The index built from a session's most recent upload.
///
/// Dropping the last reference removes the index directory.
#[derive(Debug)]
pub struct UploadedIndex {
    pub filename: String,
    pub scratch: ScratchIndex,
    pub uploaded_at: DateTime<Utc>,
}

/// Maps session ids to their current upload. Cloning shares the store.
#[derive(Debug, Default, Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<SessionId, Arc<UploadedIndex>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh random session id.
    pub fn new_session_id() -> SessionId {
        Uuid::new_v4().to_string()
    }

    /// A client-supplied id, or `None` when it is absent or blank.
    pub fn normalize(session_id: Option<&str>) -> Option<SessionId> {
        session_id.map(str::trim).filter(|id| !id.is_empty()).map(str::to_string)
    }

    /// Store `upload` for `session_id`, returning the upload it replaced.
    pub async fn replace(
        &self,
        session_id: &str,
        upload: UploadedIndex,
    ) -> Option<Arc<UploadedIndex>> {
        self.sessions.write().await.insert(session_id.to_string(), Arc::new(upload))
    }

    pub async fn get(&self, session_id: &str) -> Option<Arc<UploadedIndex>> {
        self.sessions.read().await.get(session_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use docqa_rag::testing::HashEmbedder;
    use docqa_rag::{Document, Indexer, RagConfig};

    use super::*;

    async fn upload(name: &str) -> UploadedIndex {
        let indexer = Indexer::new(RagConfig::default(), Arc::new(HashEmbedder::new(8))).unwrap();
        let scratch = indexer.build_scratch_index(&Document::new(name, "# Notes")).await.unwrap();
        UploadedIndex { filename: name.to_string(), scratch, uploaded_at: Utc::now() }
    }

    #[test]
    fn blank_session_is_absent() {
        assert_eq!(SessionStore::normalize(None), None);
        assert_eq!(SessionStore::normalize(Some("  ")), None);
        assert_eq!(SessionStore::normalize(Some(" abc ")).as_deref(), Some("abc"));
    }

    #[test]
    fn new_session_ids_are_unique() {
        assert_ne!(SessionStore::new_session_id(), SessionStore::new_session_id());
    }

    #[tokio::test]
    async fn replacing_an_upload_drops_the_old_index() {
        let store = SessionStore::new();
        assert!(store.replace("s1", upload("first.md").await).await.is_none());

        let previous = store.replace("s1", upload("second.md").await).await.unwrap();
        let old_dir = previous.scratch.path().to_path_buf();
        drop(previous);
        assert!(!old_dir.exists());

        assert_eq!(store.get("s1").await.unwrap().filename, "second.md");
    }

    #[tokio::test]
    async fn sessions_are_independent() {
        let store = SessionStore::new();
        store.replace("a", upload("a.md").await).await;
        store.replace("b", upload("b.md").await).await;

        assert_eq!(store.get("a").await.unwrap().filename, "a.md");
        assert_eq!(store.get("b").await.unwrap().filename, "b.md");
        assert!(store.get("c").await.is_none());
    }
}
