//! Documents, their page texts, and the chat sessions attached to them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an uploaded document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub String);

impl DocumentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for DocumentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a chat session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatSessionId(pub String);

impl ChatSessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ChatSessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for ChatSessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for ChatSessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The extracted text of one page. Pages are numbered from 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSnippet {
    pub page: u32,
    pub content: String,
}

impl PageSnippet {
    pub fn new(page: u32, content: impl Into<String>) -> Self {
        Self {
            page,
            content: content.into(),
        }
    }

    /// Number page texts from 1 in the order given.
    ///
    /// An empty list still produces a single empty page 1, so every stored
    /// document has at least one page record.
    pub fn number_pages(pages: Vec<String>) -> Vec<PageSnippet> {
        if pages.is_empty() {
            return vec![PageSnippet::new(1, "")];
        }
        pages
            .into_iter()
            .enumerate()
            .map(|(i, content)| PageSnippet::new(i as u32 + 1, content))
            .collect()
    }
}

/// Metadata for an uploaded document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: DocumentId,
    pub user_id: String,
    pub title: String,
    pub blob_url: String,
    pub page_count: u32,
    pub created_at: DateTime<Utc>,
}

/// A chat session bound to one user and one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: ChatSessionId,
    pub user_id: String,
    pub document_id: DocumentId,
    pub title: String,
    pub created_at: DateTime<Utc>,
}
