//! Storage traits for the collaborators the assistant reads and writes.
//!
//! Implementations: in-memory (for testing and one-shot CLI use) and SQLite.

use async_trait::async_trait;
use crate::document::{ChatSession, ChatSessionId, Document, DocumentId, PageSnippet};
use crate::error::{PersistenceError, RetrievalError};
use crate::message::{Role, StoredTurn};

/// Read access to the page texts an extractor produced for a document.
#[async_trait]
pub trait PageStore: Send + Sync {
    /// The backend name (e.g., "memory", "sqlite").
    fn name(&self) -> &str;

    /// All pages of a document, ordered by page ascending.
    ///
    /// An unknown document yields an empty sequence, not an error.
    async fn fetch_page_texts(
        &self,
        document_id: &DocumentId,
    ) -> std::result::Result<Vec<PageSnippet>, RetrievalError>;
}

/// Documents and their blob locations.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Store a document with its page texts (numbered from 1 in order).
    async fn create_document(
        &self,
        user_id: &str,
        title: &str,
        blob_url: &str,
        pages: Vec<String>,
    ) -> std::result::Result<Document, PersistenceError>;

    /// Look up a document by ID.
    async fn document(
        &self,
        id: &DocumentId,
    ) -> std::result::Result<Option<Document>, PersistenceError>;

    /// Where the uploaded file can be fetched from.
    async fn document_blob_url(
        &self,
        id: &DocumentId,
    ) -> std::result::Result<Option<String>, PersistenceError> {
        Ok(self.document(id).await?.map(|d| d.blob_url))
    }
}

/// Chat sessions and their append-only transcripts.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Open a new session for a user and document.
    async fn create_session(
        &self,
        user_id: &str,
        document_id: &DocumentId,
        title: &str,
    ) -> std::result::Result<ChatSession, PersistenceError>;

    /// The most recently created session for a user and document.
    async fn latest_session(
        &self,
        user_id: &str,
        document_id: &DocumentId,
    ) -> std::result::Result<Option<ChatSession>, PersistenceError>;

    /// Append one turn to a session's transcript.
    async fn append_chat_turn(
        &self,
        session_id: &ChatSessionId,
        role: Role,
        content: &str,
    ) -> std::result::Result<StoredTurn, PersistenceError>;

    /// The transcript of a session, oldest first.
    async fn history(
        &self,
        session_id: &ChatSessionId,
    ) -> std::result::Result<Vec<StoredTurn>, PersistenceError>;

    /// Reuse the latest session for this user and document, or open one.
    async fn ensure_session(
        &self,
        user_id: &str,
        document_id: &DocumentId,
    ) -> std::result::Result<ChatSession, PersistenceError> {
        match self.latest_session(user_id, document_id).await? {
            Some(session) => Ok(session),
            None => self.create_session(user_id, document_id, "Session").await,
        }
    }
}
