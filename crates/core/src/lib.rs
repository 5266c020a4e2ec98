//! # Folio Core
//!
//! Domain types, traits, and error definitions for the Folio PDF assistant.
//! This crate has **zero framework dependencies**; it defines the domain model
//! that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (page text storage, chat transcripts, speech,
//! text-generation backends) is defined as a trait here. Implementations live
//! in their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod directive;
pub mod document;
pub mod error;
pub mod message;
pub mod provider;
pub mod speech;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use directive::{ActionPayload, Directive, QuoteTarget};
pub use document::{ChatSession, ChatSessionId, Document, DocumentId, PageSnippet};
pub use message::{ChatTurn, Role, StoredTurn};
pub use provider::{Provider, ProviderRequest, ProviderResponse};
pub use speech::SpeechBackend;
pub use store::{ChatStore, DocumentStore, PageStore};
