//! Storage implementations for Folio.
//!
//! One type implements all three collaborator traits so a single handle can
//! be shared between the chat turn, the document routes, and the history
//! routes.

pub mod in_memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use in_memory::InMemoryStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

use folio_config::StorageConfig;
use folio_core::error::PersistenceError;
use folio_core::store::{ChatStore, DocumentStore, PageStore};
use std::sync::Arc;

/// Everything the gateway needs from storage.
pub trait Store: PageStore + DocumentStore + ChatStore {}

impl<T: PageStore + DocumentStore + ChatStore> Store for T {}

/// Open the backend named in the storage configuration.
pub async fn open(config: &StorageConfig) -> Result<Arc<dyn Store>, PersistenceError> {
    match config.backend.as_str() {
        "memory" => Ok(Arc::new(InMemoryStore::new())),
        #[cfg(feature = "sqlite")]
        "sqlite" => Ok(Arc::new(SqliteStore::new(&config.url).await?)),
        other => Err(PersistenceError::Storage(format!(
            "Unsupported storage backend '{other}'"
        ))),
    }
}
