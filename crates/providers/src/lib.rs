//! Text-generation and speech backends for Folio.
//!
//! Vendor clients implement `folio_core::Provider`. A [`ModelChain`] turns a
//! provider plus model list into a [`Backend`], a [`FallbackPlan`] orders
//! backends, and the [`GenerationGateway`] runs the plan for one prompt.

pub mod backend;
pub mod fallback;
pub mod gateway;
pub mod openai_compat;
pub mod router;
pub mod speech;

pub use backend::{Backend, ModelChain};
pub use fallback::{FailureKind, FallbackPlan, OnFailure, PlanError, PlanStep};
pub use gateway::GenerationGateway;
pub use openai_compat::OpenAiCompatProvider;
pub use router::build_from_config;
pub use speech::OpenAiSpeech;
