//! In-memory store: useful for testing and one-shot CLI runs.

use async_trait::async_trait;
use chrono::Utc;
use folio_core::document::{ChatSession, ChatSessionId, Document, DocumentId, PageSnippet};
use folio_core::error::{PersistenceError, RetrievalError};
use folio_core::message::{Role, StoredTurn};
use folio_core::store::{ChatStore, DocumentStore, PageStore};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct State {
    documents: HashMap<DocumentId, Document>,
    pages: HashMap<DocumentId, Vec<PageSnippet>>,
    sessions: Vec<ChatSession>,
    turns: HashMap<ChatSessionId, Vec<StoredTurn>>,
}

/// Keeps documents, page texts, and transcripts in process memory.
/// Nothing survives a restart.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed page texts for a document without registering its metadata.
    pub async fn insert_pages(&self, document_id: &DocumentId, mut pages: Vec<PageSnippet>) {
        pages.sort_by_key(|p| p.page);
        self.state
            .write()
            .await
            .pages
            .insert(document_id.clone(), pages);
    }
}

#[async_trait]
impl PageStore for InMemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn fetch_page_texts(
        &self,
        document_id: &DocumentId,
    ) -> Result<Vec<PageSnippet>, RetrievalError> {
        Ok(self
            .state
            .read()
            .await
            .pages
            .get(document_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn create_document(
        &self,
        user_id: &str,
        title: &str,
        blob_url: &str,
        pages: Vec<String>,
    ) -> Result<Document, PersistenceError> {
        let pages = PageSnippet::number_pages(pages);
        let document = Document {
            id: DocumentId::new(),
            user_id: user_id.to_string(),
            title: title.to_string(),
            blob_url: blob_url.to_string(),
            page_count: pages.len() as u32,
            created_at: Utc::now(),
        };

        let mut state = self.state.write().await;
        state.pages.insert(document.id.clone(), pages);
        state.documents.insert(document.id.clone(), document.clone());
        Ok(document)
    }

    async fn document(&self, id: &DocumentId) -> Result<Option<Document>, PersistenceError> {
        Ok(self.state.read().await.documents.get(id).cloned())
    }
}

#[async_trait]
impl ChatStore for InMemoryStore {
    async fn create_session(
        &self,
        user_id: &str,
        document_id: &DocumentId,
        title: &str,
    ) -> Result<ChatSession, PersistenceError> {
        let session = ChatSession {
            id: ChatSessionId::new(),
            user_id: user_id.to_string(),
            document_id: document_id.clone(),
            title: title.to_string(),
            created_at: Utc::now(),
        };
        self.state.write().await.sessions.push(session.clone());
        Ok(session)
    }

    async fn latest_session(
        &self,
        user_id: &str,
        document_id: &DocumentId,
    ) -> Result<Option<ChatSession>, PersistenceError> {
        // Sessions are pushed in creation order, so the last match is the newest.
        Ok(self
            .state
            .read()
            .await
            .sessions
            .iter()
            .rev()
            .find(|s| s.user_id == user_id && &s.document_id == document_id)
            .cloned())
    }

    async fn append_chat_turn(
        &self,
        session_id: &ChatSessionId,
        role: Role,
        content: &str,
    ) -> Result<StoredTurn, PersistenceError> {
        let turn = StoredTurn {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        self.state
            .write()
            .await
            .turns
            .entry(session_id.clone())
            .or_default()
            .push(turn.clone());
        Ok(turn)
    }

    async fn history(&self, session_id: &ChatSessionId) -> Result<Vec<StoredTurn>, PersistenceError> {
        Ok(self
            .state
            .read()
            .await
            .turns
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_document_numbers_pages() {
        let store = InMemoryStore::new();
        let doc = store
            .create_document("u1", "Biology", "blob://bio.pdf", vec!["cells".into(), "leaves".into()])
            .await
            .unwrap();
        assert_eq!(doc.page_count, 2);

        let pages = store.fetch_page_texts(&doc.id).await.unwrap();
        assert_eq!(pages, vec![PageSnippet::new(1, "cells"), PageSnippet::new(2, "leaves")]);
        assert_eq!(
            store.document_blob_url(&doc.id).await.unwrap().as_deref(),
            Some("blob://bio.pdf")
        );
    }

    #[tokio::test]
    async fn empty_extraction_stores_one_empty_page() {
        let store = InMemoryStore::new();
        let doc = store.create_document("u1", "Scan", "blob://scan.pdf", vec![]).await.unwrap();
        assert_eq!(doc.page_count, 1);
        assert_eq!(
            store.fetch_page_texts(&doc.id).await.unwrap(),
            vec![PageSnippet::new(1, "")]
        );
    }

    #[tokio::test]
    async fn unknown_document_has_no_pages() {
        let store = InMemoryStore::new();
        assert!(store.fetch_page_texts(&DocumentId::from("nope")).await.unwrap().is_empty());
        assert!(store.document(&DocumentId::from("nope")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn inserted_pages_are_ordered() {
        let store = InMemoryStore::new();
        let id = DocumentId::from("d");
        store
            .insert_pages(&id, vec![PageSnippet::new(2, "b"), PageSnippet::new(1, "a")])
            .await;
        let pages = store.fetch_page_texts(&id).await.unwrap();
        assert_eq!(pages[0].page, 1);
        assert_eq!(pages[1].page, 2);
    }

    #[tokio::test]
    async fn ensure_session_reuses_latest() {
        let store = InMemoryStore::new();
        let doc = DocumentId::from("d");
        let first = store.ensure_session("u1", &doc).await.unwrap();
        assert_eq!(first.title, "Session");

        let again = store.ensure_session("u1", &doc).await.unwrap();
        assert_eq!(first.id, again.id);

        let newer = store.create_session("u1", &doc, "Second").await.unwrap();
        assert_eq!(store.ensure_session("u1", &doc).await.unwrap().id, newer.id);

        let other_user = store.ensure_session("u2", &doc).await.unwrap();
        assert_ne!(other_user.id, newer.id);
    }

    #[tokio::test]
    async fn history_is_append_ordered() {
        let store = InMemoryStore::new();
        let session = ChatSessionId::from("s");
        store.append_chat_turn(&session, Role::User, "q").await.unwrap();
        store.append_chat_turn(&session, Role::Assistant, "a").await.unwrap();

        let history = store.history(&session).await.unwrap();
        let contents: Vec<_> = history.iter().map(|t| (t.role, t.content.as_str())).collect();
        assert_eq!(contents, vec![(Role::User, "q"), (Role::Assistant, "a")]);
        assert!(store.history(&ChatSessionId::from("other")).await.unwrap().is_empty());
    }
}
