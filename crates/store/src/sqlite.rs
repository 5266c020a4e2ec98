//! SQLite store.
//!
//! Uses a single SQLite database file with four tables:
//! - `documents`: uploaded document metadata
//! - `page_texts`: one row per extracted page, keyed by (document, page)
//! - `chat_sessions`: sessions per user and document
//! - `chat_messages`: append-only transcripts, ordered by insertion

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use folio_core::document::{ChatSession, ChatSessionId, Document, DocumentId, PageSnippet};
use folio_core::error::{PersistenceError, RetrievalError};
use folio_core::message::{Role, StoredTurn};
use folio_core::store::{ChatStore, DocumentStore, PageStore};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) a database.
    ///
    /// Pass `"sqlite::memory:"` for an in-process ephemeral database (useful for tests).
    pub async fn new(url: &str) -> Result<Self, PersistenceError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| PersistenceError::Storage(format!("Invalid SQLite URL: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        // An in-memory database lives and dies with its connection.
        let max_connections = if url.contains(":memory:") { 1 } else { 4 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| PersistenceError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite store initialized at {url}");
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), PersistenceError> {
        let statements = [
            (
                "documents table",
                r#"
                CREATE TABLE IF NOT EXISTS documents (
                    id          TEXT PRIMARY KEY NOT NULL,
                    user_id     TEXT NOT NULL,
                    title       TEXT NOT NULL,
                    blob_url    TEXT NOT NULL,
                    page_count  INTEGER NOT NULL,
                    created_at  TEXT NOT NULL
                )
                "#,
            ),
            (
                "page_texts table",
                r#"
                CREATE TABLE IF NOT EXISTS page_texts (
                    document_id TEXT NOT NULL,
                    page        INTEGER NOT NULL,
                    content     TEXT NOT NULL,
                    PRIMARY KEY (document_id, page)
                )
                "#,
            ),
            (
                "chat_sessions table",
                r#"
                CREATE TABLE IF NOT EXISTS chat_sessions (
                    iid         INTEGER PRIMARY KEY AUTOINCREMENT,
                    id          TEXT UNIQUE NOT NULL,
                    user_id     TEXT NOT NULL,
                    document_id TEXT NOT NULL,
                    title       TEXT NOT NULL,
                    created_at  TEXT NOT NULL
                )
                "#,
            ),
            (
                "chat_messages table",
                r#"
                CREATE TABLE IF NOT EXISTS chat_messages (
                    iid         INTEGER PRIMARY KEY AUTOINCREMENT,
                    id          TEXT UNIQUE NOT NULL,
                    session_id  TEXT NOT NULL,
                    role        TEXT NOT NULL,
                    content     TEXT NOT NULL,
                    created_at  TEXT NOT NULL
                )
                "#,
            ),
            (
                "sessions index",
                "CREATE INDEX IF NOT EXISTS idx_sessions_owner ON chat_sessions(user_id, document_id)",
            ),
            (
                "messages index",
                "CREATE INDEX IF NOT EXISTS idx_messages_session ON chat_messages(session_id)",
            ),
        ];

        for (what, sql) in statements {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| PersistenceError::MigrationFailed(format!("{what}: {e}")))?;
        }

        debug!("SQLite migrations complete");
        Ok(())
    }
}

fn parse_time(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn column<'r, T>(row: &'r sqlx::sqlite::SqliteRow, name: &str) -> Result<T, PersistenceError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name)
        .map_err(|e| PersistenceError::QueryFailed(format!("{name} column: {e}")))
}

fn row_to_document(row: &sqlx::sqlite::SqliteRow) -> Result<Document, PersistenceError> {
    let page_count: i64 = column(row, "page_count")?;
    let created_at: String = column(row, "created_at")?;
    Ok(Document {
        id: DocumentId(column(row, "id")?),
        user_id: column(row, "user_id")?,
        title: column(row, "title")?,
        blob_url: column(row, "blob_url")?,
        page_count: page_count as u32,
        created_at: parse_time(&created_at),
    })
}

fn row_to_session(row: &sqlx::sqlite::SqliteRow) -> Result<ChatSession, PersistenceError> {
    let created_at: String = column(row, "created_at")?;
    Ok(ChatSession {
        id: ChatSessionId(column(row, "id")?),
        user_id: column(row, "user_id")?,
        document_id: DocumentId(column(row, "document_id")?),
        title: column(row, "title")?,
        created_at: parse_time(&created_at),
    })
}

fn row_to_turn(row: &sqlx::sqlite::SqliteRow) -> Result<StoredTurn, PersistenceError> {
    let role: String = column(row, "role")?;
    let created_at: String = column(row, "created_at")?;
    Ok(StoredTurn {
        id: column(row, "id")?,
        role: role.parse().map_err(PersistenceError::QueryFailed)?,
        content: column(row, "content")?,
        created_at: parse_time(&created_at),
    })
}

#[async_trait]
impl PageStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn fetch_page_texts(
        &self,
        document_id: &DocumentId,
    ) -> Result<Vec<PageSnippet>, RetrievalError> {
        let rows = sqlx::query(
            "SELECT page, content FROM page_texts WHERE document_id = ?1 ORDER BY page ASC",
        )
        .bind(document_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RetrievalError::Unavailable(e.to_string()))?;

        rows.iter()
            .map(|row| {
                let page: i64 = row
                    .try_get("page")
                    .map_err(|e| RetrievalError::QueryFailed(format!("page column: {e}")))?;
                let content: String = row
                    .try_get("content")
                    .map_err(|e| RetrievalError::QueryFailed(format!("content column: {e}")))?;
                Ok(PageSnippet::new(page as u32, content))
            })
            .collect()
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
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

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| PersistenceError::Storage(format!("BEGIN failed: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO documents (id, user_id, title, blob_url, page_count, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(document.id.as_str())
        .bind(&document.user_id)
        .bind(&document.title)
        .bind(&document.blob_url)
        .bind(document.page_count as i64)
        .bind(document.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(|e| PersistenceError::Storage(format!("INSERT document failed: {e}")))?;

        for page in &pages {
            sqlx::query("INSERT INTO page_texts (document_id, page, content) VALUES (?1, ?2, ?3)")
                .bind(document.id.as_str())
                .bind(page.page as i64)
                .bind(&page.content)
                .execute(&mut *tx)
                .await
                .map_err(|e| PersistenceError::Storage(format!("INSERT page failed: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| PersistenceError::Storage(format!("COMMIT failed: {e}")))?;

        debug!(document = %document.id, pages = pages.len(), "Stored document");
        Ok(document)
    }

    async fn document(&self, id: &DocumentId) -> Result<Option<Document>, PersistenceError> {
        let row = sqlx::query("SELECT * FROM documents WHERE id = ?1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PersistenceError::QueryFailed(e.to_string()))?;

        row.as_ref().map(row_to_document).transpose()
    }
}

#[async_trait]
impl ChatStore for SqliteStore {
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

        sqlx::query(
            r#"
            INSERT INTO chat_sessions (id, user_id, document_id, title, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(session.id.as_str())
        .bind(&session.user_id)
        .bind(session.document_id.as_str())
        .bind(&session.title)
        .bind(session.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| PersistenceError::Storage(format!("INSERT session failed: {e}")))?;

        Ok(session)
    }

    async fn latest_session(
        &self,
        user_id: &str,
        document_id: &DocumentId,
    ) -> Result<Option<ChatSession>, PersistenceError> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, document_id, title, created_at FROM chat_sessions
            WHERE user_id = ?1 AND document_id = ?2
            ORDER BY iid DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(document_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PersistenceError::QueryFailed(e.to_string()))?;

        row.as_ref().map(row_to_session).transpose()
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

        sqlx::query(
            r#"
            INSERT INTO chat_messages (id, session_id, role, content, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&turn.id)
        .bind(session_id.as_str())
        .bind(turn.role.as_str())
        .bind(&turn.content)
        .bind(turn.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| PersistenceError::Storage(format!("INSERT message failed: {e}")))?;

        Ok(turn)
    }

    async fn history(&self, session_id: &ChatSessionId) -> Result<Vec<StoredTurn>, PersistenceError> {
        let rows = sqlx::query(
            r#"
            SELECT id, role, content, created_at FROM chat_messages
            WHERE session_id = ?1
            ORDER BY iid ASC
            "#,
        )
        .bind(session_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PersistenceError::QueryFailed(e.to_string()))?;

        rows.iter().map(row_to_turn).collect()
    }
}
