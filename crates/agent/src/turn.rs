//! One chat turn: select context, build the prompt, generate, record.

use crate::prompt::{PromptBuilder, SYSTEM_PROMPT};
use crate::selector::ContextSelector;
use folio_config::AppConfig;
use folio_core::document::{ChatSessionId, DocumentId};
use folio_core::error::GenerationError;
use folio_core::message::{ChatTurn, Role, last_user_utterance};
use folio_core::store::{ChatStore, PageStore};
use folio_providers::GenerationGateway;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

/// What a client sends to ask a question about a document.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnRequest {
    pub document_id: DocumentId,
    #[serde(default)]
    pub chat_session_id: Option<ChatSessionId>,
    pub messages: Vec<ChatTurn>,
}

pub struct TurnRunner {
    selector: ContextSelector,
    builder: PromptBuilder,
    gateway: Arc<GenerationGateway>,
    transcripts: Option<Arc<dyn ChatStore>>,
}

impl TurnRunner {
    pub fn new(selector: ContextSelector, builder: PromptBuilder, gateway: Arc<GenerationGateway>) -> Self {
        Self {
            selector,
            builder,
            gateway,
            transcripts: None,
        }
    }

    /// Wire everything from configuration, with the tutor system prompt.
    pub fn from_config(config: &AppConfig, pages: Arc<dyn PageStore>) -> Self {
        let gateway = folio_providers::build_from_config(&config.generation)
            .with_system_prompt(SYSTEM_PROMPT);
        Self::new(
            ContextSelector::new(pages, config.retrieval.clone()),
            PromptBuilder::new(config.retrieval.snippet_chars),
            Arc::new(gateway),
        )
    }

    /// Record each turn's question and answer in this store.
    pub fn with_transcripts(mut self, store: Arc<dyn ChatStore>) -> Self {
        self.transcripts = Some(store);
        self
    }

    /// Names of the backends the gateway may try, in plan order.
    pub fn backend_names(&self) -> Vec<&str> {
        self.gateway.backend_names()
    }

    /// Run one turn and return the raw answer text.
    ///
    /// Only generation failures are returned; retrieval and transcript
    /// problems are logged and the turn carries on.
    pub async fn run(&self, request: &TurnRequest) -> Result<String, GenerationError> {
        let question = last_user_utterance(&request.messages);
        info!(
            document = %request.document_id,
            turns = request.messages.len(),
            "Chat turn started"
        );

        let snippets = self.selector.select(&request.document_id, question).await;
        let prompt = self.builder.build(&snippets, question);
        let answer = self.gateway.generate(&prompt).await?;

        if let (Some(store), Some(session)) = (&self.transcripts, &request.chat_session_id) {
            for (role, content) in [(Role::User, question), (Role::Assistant, answer.as_str())] {
                if let Err(e) = store.append_chat_turn(session, role, content).await {
                    warn!(session = %session, role = %role, error = %e, "Failed to save chat turn");
                }
            }
        }

        info!(
            document = %request.document_id,
            context_pages = snippets.len(),
            answer_chars = answer.chars().count(),
            "Chat turn complete"
        );
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use folio_config::RetrievalConfig;
    use folio_core::error::{PersistenceError, ProviderError};
    use folio_core::message::StoredTurn;
    use folio_core::document::ChatSession;
    use folio_providers::Backend;
    use folio_store::InMemoryStore;
    use folio_core::store::DocumentStore;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records the messages it receives and answers from a fixed result.
    struct StubBackend {
        answer: Result<String, ProviderError>,
        seen: Mutex<Vec<ChatTurn>>,
    }

    impl StubBackend {
        fn answering(text: &str) -> Arc<Self> {
            Arc::new(Self {
                answer: Ok(text.into()),
                seen: Mutex::new(vec![]),
            })
        }

        fn prompt(&self) -> String {
            self.seen
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|t| t.role == Role::User)
                .map(|t| t.content.clone())
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl Backend for StubBackend {
        fn name(&self) -> &str {
            "stub"
        }

        async fn answer(&self, messages: &[ChatTurn]) -> Result<String, ProviderError> {
            *self.seen.lock().unwrap() = messages.to_vec();
            self.answer.clone()
        }
    }

    fn runner(store: Arc<InMemoryStore>, backend: Arc<StubBackend>) -> TurnRunner {
        let gateway = GenerationGateway::direct(backend, Duration::from_secs(5))
            .with_system_prompt(SYSTEM_PROMPT);
        TurnRunner::new(
            ContextSelector::new(store.clone(), RetrievalConfig::default()),
            PromptBuilder::default(),
            Arc::new(gateway),
        )
        .with_transcripts(store)
    }

    fn request(document: &str, session: Option<&str>, messages: Vec<ChatTurn>) -> TurnRequest {
        TurnRequest {
            document_id: DocumentId::from(document),
            chat_session_id: session.map(ChatSessionId::from),
            messages,
        }
    }

    #[tokio::test]
    async fn zero_page_document_uses_placeholder_prompt() {
        let store = Arc::new(InMemoryStore::new());
        let backend = StubBackend::answering("No text here.");
        let runner = runner(store, backend.clone());

        let answer = runner
            .run(&request("empty", None, vec![ChatTurn::user("What is this?")]))
            .await
            .unwrap();
        assert_eq!(answer, "No text here.");
        assert!(backend.prompt().contains("--- Page 1 ---\n(no page text available)"));
        assert!(backend.prompt().contains("Question: What is this?"));
    }

    #[tokio::test]
    async fn prompt_uses_last_user_turn_and_matching_page() {
        let store = Arc::new(InMemoryStore::new());
        let doc = store
            .create_document("u1", "Water", "blob://w", vec!["Sun is hot".into(), "Water cycle involves evaporation".into()])
            .await
            .unwrap();
        let backend = StubBackend::answering("ok");
        let runner = runner(store, backend.clone());

        runner
            .run(&request(
                doc.id.as_str(),
                None,
                vec![
                    ChatTurn::user("hello"),
                    ChatTurn::assistant("hi"),
                    ChatTurn::user("evaporation"),
                ],
            ))
            .await
            .unwrap();

        let prompt = backend.prompt();
        assert!(prompt.contains("--- Page 2 ---"));
        assert!(!prompt.contains("--- Page 1 ---"));
        assert!(prompt.contains("Question: evaporation"));

        let sent = backend.seen.lock().unwrap().clone();
        assert_eq!(sent[0], ChatTurn::system(SYSTEM_PROMPT));
    }

    #[tokio::test]
    async fn turns_are_recorded_when_session_given() {
        let store = Arc::new(InMemoryStore::new());
        let runner = runner(store.clone(), StubBackend::answering("Because."));

        runner
            .run(&request("d", Some("s1"), vec![ChatTurn::user("Why?")]))
            .await
            .unwrap();

        let history = store.history(&ChatSessionId::from("s1")).await.unwrap();
        let recorded: Vec<_> = history.iter().map(|t| (t.role, t.content.as_str())).collect();
        assert_eq!(recorded, vec![(Role::User, "Why?"), (Role::Assistant, "Because.")]);
    }

    #[tokio::test]
    async fn generation_failure_is_returned_and_nothing_recorded() {
        let store = Arc::new(InMemoryStore::new());
        let backend = Arc::new(StubBackend {
            answer: Err(ProviderError::Network("offline".into())),
            seen: Mutex::new(vec![]),
        });
        let runner = runner(store.clone(), backend);

        let err = runner
            .run(&request("d", Some("s1"), vec![ChatTurn::user("q")]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("offline"));
        assert!(store.history(&ChatSessionId::from("s1")).await.unwrap().is_empty());
    }

    struct ReadOnlyTranscripts;

    #[async_trait]
    impl ChatStore for ReadOnlyTranscripts {
        async fn create_session(
            &self,
            _user_id: &str,
            _document_id: &DocumentId,
            _title: &str,
        ) -> Result<ChatSession, PersistenceError> {
            Err(PersistenceError::Storage("read-only".into()))
        }

        async fn latest_session(
            &self,
            _user_id: &str,
            _document_id: &DocumentId,
        ) -> Result<Option<ChatSession>, PersistenceError> {
            Ok(None)
        }

        async fn append_chat_turn(
            &self,
            _session_id: &ChatSessionId,
            _role: Role,
            _content: &str,
        ) -> Result<StoredTurn, PersistenceError> {
            Err(PersistenceError::Storage("read-only".into()))
        }

        async fn history(&self, _session_id: &ChatSessionId) -> Result<Vec<StoredTurn>, PersistenceError> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn persistence_failure_still_returns_answer() {
        let store = Arc::new(InMemoryStore::new());
        let runner = runner(store, StubBackend::answering("still here"))
            .with_transcripts(Arc::new(ReadOnlyTranscripts));

        let answer = runner
            .run(&request("d", Some("s1"), vec![ChatTurn::user("q")]))
            .await
            .unwrap();
        assert_eq!(answer, "still here");
    }

    #[test]
    fn request_parses_camel_case() {
        let json = r#"{"documentId":"d1","chatSessionId":"s1","messages":[{"role":"user","content":"hi"}]}"#;
        let parsed: TurnRequest = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.document_id.as_str(), "d1");
        assert_eq!(parsed.chat_session_id.unwrap().as_str(), "s1");
        assert_eq!(parsed.messages, vec![ChatTurn::user("hi")]);
    }
}
