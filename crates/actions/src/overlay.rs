//! Overlay state owned by one render surface.

use crate::anchor::{self, AnchorError, AnchorSettings};
use crate::surface::{Rect, RenderSurface};
use folio_core::directive::{Directive, MAX_QUOTES_PER_KIND};
use serde::Serialize;
use tracing::debug;

/// One visual mark on a page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Overlay {
    /// Highlight styling on a text fragment.
    Highlight { page: u32, fragment: usize },
    /// A freestanding ring, positioned in the page container's space.
    Circle { page: u32, fragment: usize, rect: Rect },
}

impl Overlay {
    pub fn page(&self) -> u32 {
        match self {
            Overlay::Highlight { page, .. } | Overlay::Circle { page, .. } => *page,
        }
    }

    pub fn fragment(&self) -> usize {
        match self {
            Overlay::Highlight { fragment, .. } | Overlay::Circle { fragment, .. } => *fragment,
        }
    }
}

/// Everything currently drawn on a surface.
///
/// Only [`clear`](Self::clear) and [`apply`](Self::apply) change it, and
/// `apply` always clears first, so a batch never inherits marks from the
/// batch before it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OverlaySet {
    overlays: Vec<Overlay>,
}

impl OverlaySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.overlays.clear();
    }

    /// Apply one directive batch, strictly in this order:
    /// goto, clear, highlights, circles. Only the first
    /// [`MAX_QUOTES_PER_KIND`] highlights and circles of the batch are
    /// anchored. The result is painted on the surface even when it is empty.
    pub async fn apply(
        &mut self,
        batch: &[Directive],
        surface: &dyn RenderSurface,
        settings: &AnchorSettings,
    ) -> Vec<AnchorError> {
        let mut misses = Vec::new();

        let goto = batch.iter().find_map(|d| match d {
            Directive::GotoPage { page } => Some(*page),
            _ => None,
        });
        if let Some(page) = goto {
            surface.scroll_page_into_view(page);
        }

        self.clear();

        let highlights = batch
            .iter()
            .filter_map(|d| match d {
                Directive::Highlight { page, quote } => Some((*page, quote)),
                _ => None,
            })
            .take(MAX_QUOTES_PER_KIND);
        for (page, quote) in highlights {
            match anchor::locate_highlights(surface, page, quote, settings).await {
                Ok(found) => {
                    for overlay in found {
                        if !self.overlays.contains(&overlay) {
                            self.overlays.push(overlay);
                        }
                    }
                }
                Err(e) => {
                    debug!(page, quote = %quote, reason = %e, "Highlight not anchored");
                    misses.push(e);
                }
            }
        }

        let circles = batch
            .iter()
            .filter_map(|d| match d {
                Directive::Circle { page, quote } => Some((*page, quote)),
                _ => None,
            })
            .take(MAX_QUOTES_PER_KIND);
        for (page, quote) in circles {
            match anchor::locate_circle(surface, page, quote, settings).await {
                Ok(overlay) => self.overlays.push(overlay),
                Err(e) => {
                    debug!(page, quote = %quote, reason = %e, "Circle not anchored");
                    misses.push(e);
                }
            }
        }

        surface.paint(&self.overlays);
        misses
    }

    pub fn iter(&self) -> impl Iterator<Item = &Overlay> {
        self.overlays.iter()
    }

    /// `(page, fragment)` of every highlighted fragment.
    pub fn highlights(&self) -> impl Iterator<Item = (u32, usize)> + '_ {
        self.overlays.iter().filter_map(|o| match o {
            Overlay::Highlight { page, fragment } => Some((*page, *fragment)),
            Overlay::Circle { .. } => None,
        })
    }

    pub fn circles(&self) -> impl Iterator<Item = &Overlay> {
        self.overlays
            .iter()
            .filter(|o| matches!(o, Overlay::Circle { .. }))
    }

    pub fn highlight_count(&self) -> usize {
        self.highlights().count()
    }

    pub fn circle_count(&self) -> usize {
        self.circles().count()
    }

    pub fn len(&self) -> usize {
        self.overlays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overlays.is_empty()
    }
}
