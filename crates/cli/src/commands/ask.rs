//! `folio ask`: one chat turn from the terminal.
//!
//! Runs the same turn the gateway runs, then plays the answer's directives
//! against an in-memory viewer built from the document's page texts, so the
//! output shows where the viewer would scroll and what it would mark.

use folio_actions::{AnchorEngine, AnchorSettings, MemorySurface, Overlay, ScrollEvent, SurfaceMessage};
use folio_agent::{TurnRequest, TurnRunner};
use folio_config::AppConfig;
use folio_core::document::{ChatSessionId, DocumentId};
use folio_core::message::ChatTurn;
use folio_core::store::{DocumentStore, PageStore};
use folio_store::{InMemoryStore, Store};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Where the document's page texts come from.
pub enum Source {
    /// A document already registered in the configured store.
    Stored { id: String, session: Option<String> },
    /// A local text file, pages separated by form feeds.
    TextFile(PathBuf),
}

pub async fn run(source: Source, question: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let (store, document_id, session): (Arc<dyn Store>, DocumentId, Option<ChatSessionId>) =
        match source {
            Source::Stored { id, session } => {
                let store = folio_store::open(&config.storage).await?;
                (store, DocumentId(id), session.map(ChatSessionId))
            }
            Source::TextFile(path) => {
                let text = std::fs::read_to_string(&path)
                    .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
                let store = InMemoryStore::new();
                let title = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "document".into());
                let document = store
                    .create_document(
                        "local",
                        &title,
                        &format!("file://{}", path.display()),
                        split_pages(&text),
                    )
                    .await?;
                let store: Arc<dyn Store> = Arc::new(store);
                (store, document.id, None)
            }
        };

    let pages = store.fetch_page_texts(&document_id).await?;
    debug!(document = %document_id, pages = pages.len(), "Document loaded");

    let mut runner = TurnRunner::from_config(&config, store.clone());
    if session.is_some() {
        runner = runner.with_transcripts(store.clone());
    }

    let request = TurnRequest {
        document_id,
        chat_session_id: session,
        messages: vec![ChatTurn::user(question)],
    };
    let answer = runner.run(&request).await?;
    let extraction = folio_actions::extract(&answer);

    println!("{}\n", extraction.prose);

    let message = SurfaceMessage::actions(&extraction.directives);
    println!("Directives:");
    println!("{}\n", serde_json::to_string_pretty(&message)?);

    let surface = Arc::new(MemorySurface::from_pages(&pages));
    let engine = AnchorEngine::new(surface.clone(), AnchorSettings::from(&config.anchor));
    let (handle, inbox) = folio_actions::channel();
    handle.send(message);
    drop(handle);
    let overlays = engine.run(inbox).await;

    println!("Viewer:");
    for event in surface.scrolls() {
        match event {
            ScrollEvent::Page(page) => println!("  scroll   page {page}"),
            ScrollEvent::Fragment { page, fragment } => {
                println!("  scroll   page {page}, line {}", fragment + 1)
            }
        }
    }
    for overlay in overlays.iter() {
        let text = surface
            .fragment_text(overlay.page(), overlay.fragment())
            .unwrap_or_default();
        match overlay {
            Overlay::Highlight { page, .. } => println!("  mark     page {page}: {text}"),
            Overlay::Circle { page, rect, .. } => println!(
                "  circle   page {page} at ({:.0}, {:.0}), {:.0}px: {text}",
                rect.left, rect.top, rect.width
            ),
        }
    }
    if overlays.is_empty() {
        println!("  (no marks)");
    }

    Ok(())
}

/// Pages of a plain-text export: form feeds separate pages.
fn split_pages(text: &str) -> Vec<String> {
    text.split('\x0c').map(|p| p.trim().to_string()).collect()
}
