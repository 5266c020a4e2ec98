//! Anchor engine: finds quoted text on a rendered page and marks it.
//!
//! The quote is cut into at most five lowercase words and a fragment
//! matches when its lowercased text contains any one of them. Finding
//! nothing is normal and produces no overlay.

use crate::dispatch::ActionInbox;
use crate::overlay::{Overlay, OverlaySet};
use crate::surface::{PageLayout, Point, Rect, RenderSurface, TextFragment};
use folio_config::AnchorConfig;
use folio_core::directive::Directive;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Words of a quote that take part in matching.
pub const MAX_QUOTE_TOKENS: usize = 5;

/// Circle diameter relative to the larger side of the target fragment.
pub const CIRCLE_SCALE: f64 = 2.2;

/// How far the circle's corner sits above and left of the fragment, as a
/// share of the diameter.
pub const CIRCLE_OFFSET: f64 = 0.3;

/// Why a directive produced no overlay. Never shown to the user.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnchorError {
    #[error("page {0} is not rendered")]
    PageMissing(u32),

    #[error("text layer of page {page} did not mount after {polls} lookups")]
    TextLayerTimeout { page: u32, polls: u32 },

    #[error("quote has no words")]
    EmptyQuote,

    #[error("no fragment on page {page} matches {quote:?}")]
    NoMatch { page: u32, quote: String },
}

/// Bounded polling for late text layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchorSettings {
    pub poll_interval: Duration,
    pub max_polls: u32,
}

impl Default for AnchorSettings {
    fn default() -> Self {
        Self::from(&AnchorConfig::default())
    }
}

impl From<&AnchorConfig> for AnchorSettings {
    fn from(config: &AnchorConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            max_polls: config.max_polls.max(1),
        }
    }
}

/// Lowercase whitespace-separated words, first [`MAX_QUOTE_TOKENS`] only.
pub fn tokenize(quote: &str) -> Vec<String> {
    quote
        .split_whitespace()
        .take(MAX_QUOTE_TOKENS)
        .map(str::to_lowercase)
        .collect()
}

fn fragment_matches(fragment: &TextFragment, tokens: &[String]) -> bool {
    let text = fragment.text.to_lowercase();
    tokens.iter().any(|t| text.contains(t.as_str()))
}

/// The circle overlay box for a fragment, in the page container's
/// coordinate space.
pub fn circle_rect(fragment: Rect, page: Rect, scroll: Point) -> Rect {
    let top = fragment.top - page.top + scroll.y;
    let left = fragment.left - page.left + scroll.x;
    let d = fragment.width.max(fragment.height) * CIRCLE_SCALE;
    Rect::new(left - d * CIRCLE_OFFSET, top - d * CIRCLE_OFFSET, d, d)
}

/// Look the page up until its text layer is mounted or polling runs out.
///
/// A container that has not been created yet is polled for within the same
/// bound as a text layer that has not mounted yet.
pub async fn wait_for_text_layer(
    surface: &dyn RenderSurface,
    page: u32,
    settings: &AnchorSettings,
) -> Result<(PageLayout, Vec<TextFragment>), AnchorError> {
    let mut polls = 0;
    loop {
        let layout = surface.page(page);
        let container_seen = layout.is_some();
        if let Some(mut layout) = layout {
            if let Some(fragments) = layout.text_layer.take() {
                return Ok((layout, fragments));
            }
        }

        polls += 1;
        if polls >= settings.max_polls {
            return Err(if container_seen {
                AnchorError::TextLayerTimeout { page, polls }
            } else {
                AnchorError::PageMissing(page)
            });
        }
        tokio::time::sleep(settings.poll_interval).await;
    }
}

/// Highlight overlays for every fragment of `page` matching `quote`.
pub async fn locate_highlights(
    surface: &dyn RenderSurface,
    page: u32,
    quote: &str,
    settings: &AnchorSettings,
) -> Result<Vec<Overlay>, AnchorError> {
    let tokens = tokenize(quote);
    if tokens.is_empty() {
        return Err(AnchorError::EmptyQuote);
    }

    let (_, fragments) = wait_for_text_layer(surface, page, settings).await?;
    let overlays: Vec<Overlay> = fragments
        .iter()
        .filter(|f| fragment_matches(f, &tokens))
        .map(|f| Overlay::Highlight {
            page,
            fragment: f.index,
        })
        .collect();

    match overlays.first() {
        Some(first) => {
            surface.scroll_fragment_into_view(page, first.fragment());
            Ok(overlays)
        }
        None => Err(AnchorError::NoMatch {
            page,
            quote: quote.to_string(),
        }),
    }
}

/// A circle overlay around the first fragment of `page` matching `quote`.
pub async fn locate_circle(
    surface: &dyn RenderSurface,
    page: u32,
    quote: &str,
    settings: &AnchorSettings,
) -> Result<Overlay, AnchorError> {
    let tokens = tokenize(quote);
    if tokens.is_empty() {
        return Err(AnchorError::EmptyQuote);
    }

    let (layout, fragments) = wait_for_text_layer(surface, page, settings).await?;
    let target = fragments
        .iter()
        .find(|f| fragment_matches(f, &tokens))
        .ok_or_else(|| AnchorError::NoMatch {
            page,
            quote: quote.to_string(),
        })?;

    let rect = circle_rect(target.rect, layout.bounds, surface.scroll_offset());
    surface.scroll_fragment_into_view(page, target.index);
    Ok(Overlay::Circle {
        page,
        fragment: target.index,
        rect,
    })
}

/// Applies directive batches to one render surface.
pub struct AnchorEngine {
    surface: Arc<dyn RenderSurface>,
    settings: AnchorSettings,
    overlays: OverlaySet,
}

impl AnchorEngine {
    pub fn new(surface: Arc<dyn RenderSurface>, settings: AnchorSettings) -> Self {
        Self {
            surface,
            settings,
            overlays: OverlaySet::new(),
        }
    }

    pub fn overlays(&self) -> &OverlaySet {
        &self.overlays
    }

    /// Apply one batch, replacing everything the previous batch showed.
    /// Returns the directives that found nothing to anchor to.
    pub async fn apply(&mut self, batch: &[Directive]) -> Vec<AnchorError> {
        self.overlays
            .apply(batch, self.surface.as_ref(), &self.settings)
            .await
    }

    /// Apply batches from the chat surface until its handle is dropped.
    pub async fn run(mut self, mut inbox: ActionInbox) -> OverlaySet {
        info!("Anchor engine listening for directive batches");
        while let Some(batch) = inbox.recv().await {
            let misses = self.apply(&batch).await;
            debug!(
                directives = batch.len(),
                overlays = self.overlays.len(),
                misses = misses.len(),
                "Applied directive batch"
            );
        }
        info!("Directive channel closed, anchor engine stopping");
        self.overlays
    }
}
