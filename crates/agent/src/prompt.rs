//! Prompt construction.

use folio_core::document::PageSnippet;

/// Instructions sent as the system turn of every generation request.
///
/// They fix the answer's output contract: prose first, then exactly one
/// trailing JSON line of viewer actions.
pub const SYSTEM_PROMPT: &str = r#"You are an AI tutor helping a student understand a PDF.

RULES
- Ground answers in the provided PDF context when possible.
- Cite page numbers like: (see p. 12).
- Prefer including ONE short exact quote (<=120 chars) after a page citation when you reference text.
- After your prose answer, output a final single-line JSON object with tool actions:
  {"gotoPage": number|null, "highlights": [{"page": number, "quote": string}], "circles":[{"page": number, "quote": string}]}

NOTES
- Only put valid JSON on that final line, no markdown fences.
- Use quotes that actually exist on the page if possible.
- Use at most 2 items in highlights/circles.
"#;

/// Stand-in page used when no page text could be selected.
pub const PLACEHOLDER_PAGE: &str = "(no page text available)";

const CLIP_MARKER: &str = " …";

/// Renders selected pages and the question into a single user prompt.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    snippet_chars: usize,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(2000)
    }
}

impl PromptBuilder {
    pub fn new(snippet_chars: usize) -> Self {
        Self { snippet_chars }
    }

    pub fn build(&self, snippets: &[PageSnippet], question: &str) -> String {
        let placeholder = [PageSnippet::new(1, PLACEHOLDER_PAGE)];
        let snippets = if snippets.is_empty() {
            &placeholder[..]
        } else {
            snippets
        };

        let context = snippets
            .iter()
            .map(|p| format!("--- Page {} ---\n{}", p.page, clip(&p.content, self.snippet_chars)))
            .collect::<Vec<_>>()
            .join("\n\n");

        format!(
            "PDF Context:\n{context}\n\nQuestion: {question}\nRemember: finish with ONE JSON line of actions."
        )
    }
}

/// Cut `text` to `max` characters, marking the cut.
fn clip(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte, _)) => format!("{}{CLIP_MARKER}", &text[..byte]),
        None => text.to_string(),
    }
}
