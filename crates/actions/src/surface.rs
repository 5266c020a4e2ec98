//! Render surface: the anchor engine's view of a paginated document.
//!
//! A surface exposes page containers keyed by page number. Each page may or
//! may not have its text layer mounted yet; once mounted it is a list of
//! positioned text fragments. The engine only reads text and geometry and
//! asks the surface to scroll or paint overlays; it never owns the pages.

use crate::overlay::Overlay;
use folio_core::document::PageSnippet;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// An axis-aligned box in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }
}

/// One positioned piece of visible page text.
#[derive(Debug, Clone, PartialEq)]
pub struct TextFragment {
    /// Position within the page's text layer.
    pub index: usize,
    pub text: String,
    pub rect: Rect,
}

/// A snapshot of one page container.
#[derive(Debug, Clone, PartialEq)]
pub struct PageLayout {
    pub number: u32,
    pub bounds: Rect,
    /// `None` until the renderer has mounted the text layer.
    pub text_layer: Option<Vec<TextFragment>>,
}

pub trait RenderSurface: Send + Sync {
    /// The container for page `number`, if one exists right now.
    fn page(&self, number: u32) -> Option<PageLayout>;

    /// Scroll offset of the scrolling host that contains the pages.
    fn scroll_offset(&self) -> Point;

    /// Center a page container in view. Unknown pages are ignored.
    fn scroll_page_into_view(&self, number: u32);

    /// Center one fragment of a page in view.
    fn scroll_fragment_into_view(&self, page: u32, fragment: usize);

    /// Show the current overlay set, replacing whatever was shown before.
    fn paint(&self, _overlays: &[Overlay]) {}
}

/// A scroll request recorded by [`MemorySurface`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrollEvent {
    Page(u32),
    Fragment { page: u32, fragment: usize },
}

struct MemoryPage {
    fragments: Vec<String>,
    /// How many lookups find no container at all.
    appear_after: u32,
    /// How many further lookups see the container without a text layer.
    mount_after: u32,
}

// Synthetic layout: pages stacked top to bottom, one fragment per line.
const PAGE_WIDTH: f64 = 816.0;
const PAGE_HEIGHT: f64 = 1056.0;
const PAGE_GAP: f64 = 24.0;
const MARGIN: f64 = 48.0;
const LINE_HEIGHT: f64 = 20.0;
const GLYPH_HEIGHT: f64 = 14.0;
const GLYPH_WIDTH: f64 = 7.0;

/// An in-process surface with synthetic geometry.
///
/// Used by the CLI to show what an answer would do to the viewer, and by
/// tests to observe scrolling, painting, and late-mounting text layers.
#[derive(Default)]
pub struct MemorySurface {
    pages: HashMap<u32, MemoryPage>,
    scroll: Point,
    lookups: Mutex<HashMap<u32, u32>>,
    scrolls: Mutex<Vec<ScrollEvent>>,
    painted: Mutex<Vec<Overlay>>,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// A page whose text layer is mounted from the start.
    pub fn with_page(self, number: u32, fragments: Vec<&str>) -> Self {
        self.with_late_page(number, fragments, 0)
    }

    /// A page whose text layer appears only after `mount_after` lookups.
    pub fn with_late_page(self, number: u32, fragments: Vec<&str>, mount_after: u32) -> Self {
        self.insert_page(number, fragments, 0, mount_after)
    }

    /// A page whose container, text layer included, does not exist for the
    /// first `appear_after` lookups.
    pub fn with_late_container(self, number: u32, fragments: Vec<&str>, appear_after: u32) -> Self {
        self.insert_page(number, fragments, appear_after, 0)
    }

    fn insert_page(mut self, number: u32, fragments: Vec<&str>, appear_after: u32, mount_after: u32) -> Self {
        self.pages.insert(
            number,
            MemoryPage {
                fragments: fragments.into_iter().map(str::to_string).collect(),
                appear_after,
                mount_after,
            },
        );
        self
    }

    pub fn with_scroll_offset(mut self, x: f64, y: f64) -> Self {
        self.scroll = Point { x, y };
        self
    }

    /// One page per snippet, one fragment per non-empty line.
    pub fn from_pages(pages: &[PageSnippet]) -> Self {
        pages.iter().fold(Self::new(), |surface, p| {
            let lines = p.content.lines().filter(|l| !l.trim().is_empty()).collect();
            surface.with_page(p.page, lines)
        })
    }

    /// How often page `number` has been looked up.
    pub fn lookups(&self, number: u32) -> u32 {
        self.lookups
            .lock()
            .map(|l| l.get(&number).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn scrolls(&self) -> Vec<ScrollEvent> {
        self.scrolls.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// The overlays handed to the most recent `paint`.
    pub fn painted(&self) -> Vec<Overlay> {
        self.painted.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// Text of one fragment, for display.
    pub fn fragment_text(&self, page: u32, fragment: usize) -> Option<&str> {
        self.pages
            .get(&page)
            .and_then(|p| p.fragments.get(fragment))
            .map(String::as_str)
    }

    fn page_bounds(number: u32) -> Rect {
        let top = f64::from(number.saturating_sub(1)) * (PAGE_HEIGHT + PAGE_GAP);
        Rect::new(0.0, top, PAGE_WIDTH, PAGE_HEIGHT)
    }

    fn record(&self, event: ScrollEvent) {
        if let Ok(mut scrolls) = self.scrolls.lock() {
            scrolls.push(event);
        }
    }
}

impl RenderSurface for MemorySurface {
    fn page(&self, number: u32) -> Option<PageLayout> {
        let page = self.pages.get(&number)?;
        let bounds = Self::page_bounds(number);

        let seen = match self.lookups.lock() {
            Ok(mut lookups) => {
                let count = lookups.entry(number).or_insert(0);
                *count += 1;
                *count
            }
            Err(_) => u32::MAX,
        };

        if seen <= page.appear_after {
            return None;
        }

        let mounted = seen - page.appear_after > page.mount_after;
        let text_layer: Option<Vec<TextFragment>> = mounted.then(|| {
            page.fragments
                .iter()
                .enumerate()
                .map(|(index, text)| TextFragment {
                    index,
                    text: text.clone(),
                    rect: Rect::new(
                        bounds.left + MARGIN,
                        bounds.top + MARGIN + index as f64 * LINE_HEIGHT,
                        text.chars().count() as f64 * GLYPH_WIDTH,
                        GLYPH_HEIGHT,
                    ),
                })
                .collect()
        });

        Some(PageLayout {
            number,
            bounds,
            text_layer,
        })
    }

    fn scroll_offset(&self) -> Point {
        self.scroll
    }

    fn scroll_page_into_view(&self, number: u32) {
        if self.pages.contains_key(&number) {
            self.record(ScrollEvent::Page(number));
        }
    }

    fn scroll_fragment_into_view(&self, page: u32, fragment: usize) {
        self.record(ScrollEvent::Fragment { page, fragment });
    }

    fn paint(&self, overlays: &[Overlay]) {
        if let Ok(mut painted) = self.painted.lock() {
            *painted = overlays.to_vec();
        }
    }
}
