//! Action extractor: splits a raw answer into prose and directives.
//!
//! The last line that looks like a JSON object (trimmed, starts with `{`
//! and ends with `}`) is the directive line candidate. If it parses, it is
//! cut out of the prose; if it does not, the whole answer is prose and
//! there are no directives. Parse failures never reach the user.

use folio_core::directive::{ActionPayload, Directive};
use folio_core::error::DirectiveParseError;
use serde::Serialize;
use tracing::debug;

/// A raw answer, separated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Extraction {
    pub prose: String,
    pub directives: Vec<Directive>,
}

impl Extraction {
    /// The wire payload for the directives, as dispatched to the viewer.
    pub fn payload(&self) -> ActionPayload {
        ActionPayload::from_directives(&self.directives)
    }

    /// Text suitable for speech: the prose, without any leftover
    /// JSON-looking final line from a malformed directive.
    pub fn speakable(&self) -> String {
        match locate_candidate(&self.prose) {
            Some(index) => without_line(&self.prose, index),
            None => self.prose.clone(),
        }
    }
}

/// Split `raw` into prose and directives.
pub fn extract(raw: &str) -> Extraction {
    match parse_directive_line(raw) {
        Ok((index, payload)) => Extraction {
            prose: without_line(raw, index),
            directives: payload.into_directives(),
        },
        Err(e) => {
            debug!(reason = %e, "No usable directive line, treating answer as prose");
            Extraction {
                prose: raw.to_string(),
                directives: Vec::new(),
            }
        }
    }
}

/// Find and parse the directive line, returning its line index.
pub fn parse_directive_line(raw: &str) -> Result<(usize, ActionPayload), DirectiveParseError> {
    let index = locate_candidate(raw).ok_or(DirectiveParseError::NoCandidate)?;
    let line = raw.split('\n').nth(index).unwrap_or_default().trim();
    let payload = serde_json::from_str::<ActionPayload>(line)
        .map_err(|e| DirectiveParseError::Malformed(e.to_string()))?;
    Ok((index, payload))
}

fn locate_candidate(text: &str) -> Option<usize> {
    text.split('\n')
        .collect::<Vec<_>>()
        .iter()
        .rposition(|line| {
            let line = line.trim();
            line.starts_with('{') && line.ends_with('}')
        })
}

fn without_line(text: &str, index: usize) -> String {
    text.split('\n')
        .enumerate()
        .filter(|(i, _)| *i != index)
        .map(|(_, line)| line)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
