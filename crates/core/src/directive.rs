//! Directives: the machine-actionable part of an assistant turn.
//!
//! The backend is asked to finish every answer with one JSON line:
//!
//! ```text
//! {"gotoPage": 3, "highlights": [{"page": 3, "quote": "foo"}], "circles": []}
//! ```
//!
//! [`ActionPayload`] is that line's wire shape. [`Directive`] is the
//! normalized, bounded form the rendering side executes.
//!
//! Page numbers are read leniently. A page that is negative, fractional,
//! too large, or not a number at all becomes `0`, which names no page, so
//! one bad number never discards the rest of the line.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// At most this many highlights and this many circles survive per turn.
pub const MAX_QUOTES_PER_KIND: usize = 2;

/// One instruction for the document viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Directive {
    /// Scroll a page into view.
    GotoPage { page: u32 },
    /// Tint every fragment of `page` that matches `quote`.
    Highlight { page: u32, quote: String },
    /// Draw a ring around the first fragment of `page` that matches `quote`.
    Circle { page: u32, quote: String },
}

/// A `{page, quote}` pair inside the directive line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteTarget {
    #[serde(default, deserialize_with = "page_number")]
    pub page: u32,
    #[serde(default)]
    pub quote: String,
}

impl QuoteTarget {
    pub fn new(page: u32, quote: impl Into<String>) -> Self {
        Self {
            page,
            quote: quote.into(),
        }
    }
}

/// The JSON object on the last line of an answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionPayload {
    #[serde(rename = "gotoPage", default, deserialize_with = "optional_page_number")]
    pub goto_page: Option<u32>,
    #[serde(default)]
    pub highlights: Vec<QuoteTarget>,
    #[serde(default)]
    pub circles: Vec<QuoteTarget>,
}

impl ActionPayload {
    /// Normalize into directives: the goto first, then highlights, then
    /// circles, each list capped at [`MAX_QUOTES_PER_KIND`].
    ///
    /// A `gotoPage` that is `null`, absent, or names no page produces no
    /// `GotoPage`.
    pub fn into_directives(self) -> Vec<Directive> {
        let mut directives = Vec::new();

        if let Some(page) = self.goto_page.filter(|p| *p > 0) {
            directives.push(Directive::GotoPage { page });
        }

        directives.extend(
            self.highlights
                .into_iter()
                .take(MAX_QUOTES_PER_KIND)
                .map(|t| Directive::Highlight {
                    page: t.page,
                    quote: t.quote,
                }),
        );

        directives.extend(
            self.circles
                .into_iter()
                .take(MAX_QUOTES_PER_KIND)
                .map(|t| Directive::Circle {
                    page: t.page,
                    quote: t.quote,
                }),
        );

        directives
    }

    /// Rebuild the wire shape from a directive batch.
    ///
    /// Only the first `GotoPage` is kept; quote lists are capped.
    pub fn from_directives(directives: &[Directive]) -> Self {
        let mut payload = Self::default();
        for directive in directives {
            match directive {
                Directive::GotoPage { page } => {
                    payload.goto_page.get_or_insert(*page);
                }
                Directive::Highlight { page, quote } => {
                    if payload.highlights.len() < MAX_QUOTES_PER_KIND {
                        payload.highlights.push(QuoteTarget::new(*page, quote.clone()));
                    }
                }
                Directive::Circle { page, quote } => {
                    if payload.circles.len() < MAX_QUOTES_PER_KIND {
                        payload.circles.push(QuoteTarget::new(*page, quote.clone()));
                    }
                }
            }
        }
        payload
    }
}

struct PageVisitor;

impl<'de> Visitor<'de> for PageVisitor {
    type Value = Option<u32>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a page number")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(Some(u32::try_from(v).unwrap_or(0)))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(Some(u32::try_from(v).unwrap_or(0)))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        let whole = v.fract() == 0.0 && v >= 0.0 && v <= f64::from(u32::MAX);
        Ok(Some(if whole { v as u32 } else { 0 }))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        match v.trim().parse::<i64>() {
            Ok(n) => self.visit_i64(n),
            Err(_) => Ok(Some(0)),
        }
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<Self::Value, E> {
        Ok(Some(0))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Self::Value, D::Error> {
        d.deserialize_any(PageVisitor)
    }

    fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        while seq.next_element::<de::IgnoredAny>()?.is_some() {}
        Ok(Some(0))
    }

    fn visit_map<A: de::MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        while map.next_entry::<de::IgnoredAny, de::IgnoredAny>()?.is_some() {}
        Ok(Some(0))
    }
}

fn optional_page_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
    d.deserialize_any(PageVisitor)
}

fn page_number<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    Ok(optional_page_number(d)?.unwrap_or(0))
}
