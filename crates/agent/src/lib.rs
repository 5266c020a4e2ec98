//! The server side of a Folio chat turn.
//!
//! 1. **Select** page texts that ground the answer ([`ContextSelector`])
//! 2. **Build** the prompt from those pages and the question ([`PromptBuilder`])
//! 3. **Generate** through the backend fallback plan
//! 4. **Record** the question and answer in the session transcript
//!
//! The raw answer, directive line included, goes back to the caller untouched.

pub mod prompt;
pub mod selector;
pub mod turn;

pub use prompt::{PLACEHOLDER_PAGE, PromptBuilder, SYSTEM_PROMPT};
pub use selector::ContextSelector;
pub use turn::{TurnRequest, TurnRunner};
