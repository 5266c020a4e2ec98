//! Context selector: picks the page texts that ground an answer.
//!
//! Relevance is a plain case-insensitive substring test of the question's
//! opening characters against each page. This is not semantic search: a
//! question that is not quoted from the document will usually miss, and the
//! selector then falls back to the first pages so the model always sees
//! some of the document.

use folio_config::RetrievalConfig;
use folio_core::document::{DocumentId, PageSnippet};
use folio_core::store::PageStore;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct ContextSelector {
    pages: Arc<dyn PageStore>,
    config: RetrievalConfig,
}

impl ContextSelector {
    pub fn new(pages: Arc<dyn PageStore>, config: RetrievalConfig) -> Self {
        Self { pages, config }
    }

    /// Page snippets for a question, in page order.
    ///
    /// Never fails: a storage error yields an empty selection.
    pub async fn select(&self, document_id: &DocumentId, utterance: &str) -> Vec<PageSnippet> {
        let pages = match self.pages.fetch_page_texts(document_id).await {
            Ok(pages) => pages,
            Err(e) => {
                warn!(
                    document = %document_id,
                    store = %self.pages.name(),
                    error = %e,
                    "Page retrieval failed, continuing without context"
                );
                return Vec::new();
            }
        };

        let selected = select_from(pages, utterance, &self.config);
        debug!(
            document = %document_id,
            pages = ?selected.iter().map(|p| p.page).collect::<Vec<_>>(),
            "Selected context pages"
        );
        selected
    }
}

/// Apply the selection rule to an already-fetched, page-ordered list.
pub fn select_from(
    mut pages: Vec<PageSnippet>,
    utterance: &str,
    config: &RetrievalConfig,
) -> Vec<PageSnippet> {
    pages.sort_by_key(|p| p.page);

    let query: String = utterance
        .chars()
        .take(config.query_prefix_chars)
        .collect::<String>()
        .to_lowercase();

    if !query.is_empty() {
        let matches: Vec<PageSnippet> = pages
            .iter()
            .filter(|p| p.content.to_lowercase().contains(&query))
            .take(config.max_matches)
            .cloned()
            .collect();
        if !matches.is_empty() {
            return matches;
        }
    }

    pages.truncate(config.fallback_pages);
    pages
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use folio_core::error::RetrievalError;
    use folio_store::InMemoryStore;

    fn page(n: u32, content: &str) -> PageSnippet {
        PageSnippet::new(n, content)
    }

    fn numbers(pages: &[PageSnippet]) -> Vec<u32> {
        pages.iter().map(|p| p.page).collect()
    }

    #[test]
    fn single_matching_page_is_returned_alone() {
        let pages = vec![
            page(1, "Cells and membranes"),
            page(2, "Mitochondria"),
            page(3, "Respiration"),
            page(4, "Plants rely on PHOTOSYNTHESIS to make sugar"),
            page(5, "Ecology"),
        ];
        let selected = select_from(pages, "photosynthesis", &RetrievalConfig::default());
        assert_eq!(numbers(&selected), vec![4]);
        assert!(selected[0].content.contains("PHOTOSYNTHESIS"));
    }

    #[test]
    fn no_match_falls_back_to_first_three_pages() {
        let pages = (1..=6).map(|n| page(n, "unrelated")).collect();
        let selected = select_from(pages, "quantum chromodynamics", &RetrievalConfig::default());
        assert_eq!(numbers(&selected), vec![1, 2, 3]);
    }

    #[test]
    fn empty_utterance_falls_back() {
        let pages = (1..=5).map(|n| page(n, "anything")).collect();
        assert_eq!(numbers(&select_from(pages, "", &RetrievalConfig::default())), vec![1, 2, 3]);
    }

    #[test]
    fn matches_are_capped_in_page_order() {
        let pages = (1..=7).rev().map(|n| page(n, "the water cycle")).collect();
        let selected = select_from(pages, "Water", &RetrievalConfig::default());
        assert_eq!(numbers(&selected), vec![1, 2, 3, 4]);
    }

    #[test]
    fn only_the_query_prefix_is_matched() {
        let config = RetrievalConfig {
            query_prefix_chars: 5,
            ..RetrievalConfig::default()
        };
        let pages = vec![page(1, "intro"), page(2, "the water table")];
        let selected = select_from(pages, "water and a long tail that no page contains", &config);
        assert_eq!(numbers(&selected), vec![2]);
    }

    #[test]
    fn zero_pages_select_nothing() {
        assert!(select_from(vec![], "anything", &RetrievalConfig::default()).is_empty());
    }

    struct BrokenStore;

    #[async_trait]
    impl PageStore for BrokenStore {
        fn name(&self) -> &str {
            "broken"
        }

        async fn fetch_page_texts(
            &self,
            _document_id: &DocumentId,
        ) -> Result<Vec<PageSnippet>, RetrievalError> {
            Err(RetrievalError::Unavailable("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn retrieval_failure_degrades_to_empty() {
        let selector = ContextSelector::new(Arc::new(BrokenStore), RetrievalConfig::default());
        assert!(selector.select(&DocumentId::from("d"), "q").await.is_empty());
    }

    #[tokio::test]
    async fn selects_through_the_store() {
        let store = InMemoryStore::new();
        let id = DocumentId::from("water");
        store
            .insert_pages(
                &id,
                vec![page(1, "Sun is hot"), page(2, "Water cycle involves evaporation")],
            )
            .await;

        let selector = ContextSelector::new(Arc::new(store), RetrievalConfig::default());
        let selected = selector.select(&id, "evaporation").await;
        assert_eq!(numbers(&selected), vec![2]);
    }
}
