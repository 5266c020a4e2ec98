//! # Folio Actions
//!
//! Turns an assistant's raw answer into marks on the document viewer:
//!
//! 1. [`extract`] splits the answer into prose and [`Directive`]s
//! 2. a [`DispatchHandle`] sends the batch to the viewer's [`ActionInbox`]
//! 3. the [`AnchorEngine`] scrolls, clears, and anchors each quote on a
//!    [`RenderSurface`], keeping the result in an [`OverlaySet`]
//!
//! [`Directive`]: folio_core::Directive

pub mod anchor;
pub mod dispatch;
pub mod extract;
pub mod overlay;
pub mod surface;

pub use anchor::{AnchorEngine, AnchorError, AnchorSettings};
pub use dispatch::{ActionInbox, DispatchHandle, SurfaceMessage, channel};
pub use extract::{Extraction, extract};
pub use overlay::{Overlay, OverlaySet};
pub use surface::{MemorySurface, PageLayout, Point, Rect, RenderSurface, ScrollEvent, TextFragment};
