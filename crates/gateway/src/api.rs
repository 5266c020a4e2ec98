//! `/api` route handlers.
//!
//! Every handler runs behind the bearer-auth middleware and reads the caller
//! from the [`CurrentUser`] extension.

use crate::{CurrentUser, SharedState};
use axum::{
    Extension,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Json, Response},
};
use folio_agent::TurnRequest;
use folio_core::document::{ChatSessionId, DocumentId};
use folio_core::store::{ChatStore, DocumentStore};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

const BAD_CHAT_REQUEST: &str = "Bad Request: need documentId and messages[]";

fn plain(status: StatusCode, message: impl Into<String>) -> Response {
    (status, message.into()).into_response()
}

fn server_error(e: impl std::fmt::Display) -> Response {
    plain(StatusCode::INTERNAL_SERVER_ERROR, format!("Server error: {e}"))
}

fn parse_json<T: DeserializeOwned>(body: &Bytes) -> Result<T, Response> {
    serde_json::from_slice(body).map_err(|_| plain(StatusCode::BAD_REQUEST, "Bad JSON"))
}

// ── Chat ──────────────────────────────────────────────────────────────────

/// `POST /api/chat`: run one turn and answer with the raw text, directive
/// line included.
pub async fn chat(State(state): State<SharedState>, body: Bytes) -> Response {
    let value: serde_json::Value = match parse_json(&body) {
        Ok(v) => v,
        Err(rejection) => return rejection,
    };

    let has_document = value
        .get("documentId")
        .and_then(|v| v.as_str())
        .is_some_and(|id| !id.is_empty());
    let has_messages = value
        .get("messages")
        .and_then(|v| v.as_array())
        .is_some_and(|m| !m.is_empty());
    if !has_document || !has_messages {
        return plain(StatusCode::BAD_REQUEST, BAD_CHAT_REQUEST);
    }

    let request: TurnRequest = match serde_json::from_value(value) {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "Rejected chat request");
            return plain(StatusCode::BAD_REQUEST, BAD_CHAT_REQUEST);
        }
    };

    match state.runner.run(&request).await {
        Ok(answer) => (
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            answer,
        )
            .into_response(),
        Err(e) => {
            error!(document = %request.document_id, error = %e, "Chat turn failed");
            server_error(e)
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    #[serde(default)]
    chat_session_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub id: String,
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub messages: Vec<HistoryMessage>,
}

/// `GET /api/chat/history?chatSessionId=`: a session's transcript, oldest
/// first. Unknown sessions and storage failures both yield an empty list.
pub async fn chat_history(
    State(state): State<SharedState>,
    Query(query): Query<HistoryQuery>,
) -> Json<HistoryResponse> {
    let Some(session) = query.chat_session_id.filter(|s| !s.is_empty()) else {
        return Json(HistoryResponse { messages: vec![] });
    };

    let turns = match state.store.history(&ChatSessionId::from(session.as_str())).await {
        Ok(turns) => turns,
        Err(e) => {
            warn!(session = %session, error = %e, "Failed to load chat history");
            vec![]
        }
    };

    Json(HistoryResponse {
        messages: turns
            .into_iter()
            .map(|t| HistoryMessage {
                id: t.id,
                role: t.role.to_string(),
                content: t.content,
            })
            .collect(),
    })
}

// ── Sessions & documents ──────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnsureSessionQuery {
    #[serde(default)]
    document_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub chat_session_id: String,
}

/// `GET /api/ensure-session?documentId=`: the caller's newest session for
/// the document, created when there is none.
pub async fn ensure_session(
    State(state): State<SharedState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Query(query): Query<EnsureSessionQuery>,
) -> Response {
    let Some(document_id) = query
        .document_id
        .filter(|d| !d.is_empty())
        .map(DocumentId)
    else {
        return plain(StatusCode::BAD_REQUEST, "Bad Request: need documentId");
    };

    match state.store.document(&document_id).await {
        Ok(Some(doc)) if doc.user_id != user => {
            return plain(StatusCode::NOT_FOUND, "Not found");
        }
        Ok(_) => {}
        Err(e) => return server_error(e),
    }

    match state.store.ensure_session(&user, &document_id).await {
        Ok(session) => Json(SessionResponse {
            chat_session_id: session.id.to_string(),
        })
        .into_response(),
        Err(e) => server_error(e),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDocumentRequest {
    #[serde(default)]
    title: String,
    blob_url: String,
    #[serde(default)]
    pages: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDocumentResponse {
    pub document_id: String,
    pub chat_session_id: String,
}

/// Title given to documents registered without one.
pub const DEFAULT_TITLE: &str = "Untitled PDF";

/// `POST /api/docs`: store an uploaded document's page texts and open its
/// first chat session.
pub async fn register_document(
    State(state): State<SharedState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    body: Bytes,
) -> Response {
    let request: RegisterDocumentRequest = match parse_json(&body) {
        Ok(r) => r,
        Err(rejection) => return rejection,
    };
    if request.blob_url.is_empty() {
        return plain(StatusCode::BAD_REQUEST, "Bad Request: need blobUrl");
    }

    let title = if request.title.trim().is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        request.title
    };

    let document = match state
        .store
        .create_document(&user, &title, &request.blob_url, request.pages)
        .await
    {
        Ok(d) => d,
        Err(e) => return server_error(e),
    };

    let session = match state.store.create_session(&user, &document.id, "Session").await {
        Ok(s) => s,
        Err(e) => return server_error(e),
    };

    info!(
        document = %document.id,
        pages = document.page_count,
        "Document registered"
    );

    Json(RegisterDocumentResponse {
        document_id: document.id.to_string(),
        chat_session_id: session.id.to_string(),
    })
    .into_response()
}

/// `GET /api/docs/{id}`: document metadata, visible only to its owner.
pub async fn get_document(
    State(state): State<SharedState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Response {
    match state.store.document(&DocumentId(id)).await {
        Ok(Some(doc)) if doc.user_id == user => Json(doc).into_response(),
        Ok(_) => plain(StatusCode::NOT_FOUND, "Not found"),
        Err(e) => server_error(e),
    }
}

// ── Speech ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct TranscriptResponse {
    pub text: String,
}

#[derive(Deserialize)]
pub struct SpeakRequest {
    #[serde(default)]
    text: String,
}

fn speech_disabled() -> Response {
    plain(StatusCode::SERVICE_UNAVAILABLE, "Speech is disabled")
}

/// `POST /api/speech-to-text`: raw audio body, typed by `Content-Type`.
pub async fn speech_to_text(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(speech) = state.speech.clone() else {
        return speech_disabled();
    };
    if body.is_empty() {
        return plain(StatusCode::BAD_REQUEST, "Bad Request: no audio");
    }

    let mime_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("audio/webm");

    match speech.transcribe(body.to_vec(), mime_type).await {
        Ok(text) => Json(TranscriptResponse { text }).into_response(),
        Err(e) => {
            error!(backend = speech.name(), error = %e, "Transcription failed");
            server_error(e)
        }
    }
}

/// `POST /api/text-to-speech`: `{text}` in, MP3 bytes out.
pub async fn text_to_speech(State(state): State<SharedState>, body: Bytes) -> Response {
    let Some(speech) = state.speech.clone() else {
        return speech_disabled();
    };
    let request: SpeakRequest = match parse_json(&body) {
        Ok(r) => r,
        Err(rejection) => return rejection,
    };
    if request.text.trim().is_empty() {
        return plain(StatusCode::BAD_REQUEST, "Bad Request: need text");
    }

    match speech.synthesize(&request.text).await {
        Ok(audio) => ([(header::CONTENT_TYPE, "audio/mpeg")], audio).into_response(),
        Err(e) => {
            error!(backend = speech.name(), error = %e, "Speech synthesis failed");
            server_error(e)
        }
    }
}
