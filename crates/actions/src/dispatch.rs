//! Action dispatcher: a typed channel from the chat surface to the viewer.
//!
//! Each assistant turn sends one batch as one message. Sending is
//! fire-and-forget: there is no acknowledgement, and a batch sent after the
//! viewer has gone away is dropped.

use folio_core::directive::{ActionPayload, Directive};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

/// Messages that cross from the chat surface to the rendering surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SurfaceMessage {
    #[serde(rename = "ai-actions")]
    AiActions { payload: ActionPayload },
}

impl SurfaceMessage {
    pub fn actions(directives: &[Directive]) -> Self {
        SurfaceMessage::AiActions {
            payload: ActionPayload::from_directives(directives),
        }
    }
}

/// Create a connected producer/consumer pair.
pub fn channel() -> (DispatchHandle, ActionInbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    (DispatchHandle { tx }, ActionInbox { rx })
}

/// The chat surface's end.
#[derive(Debug, Clone)]
pub struct DispatchHandle {
    tx: mpsc::UnboundedSender<SurfaceMessage>,
}

impl DispatchHandle {
    pub fn dispatch(&self, directives: &[Directive]) {
        self.send(SurfaceMessage::actions(directives));
    }

    pub fn send(&self, message: SurfaceMessage) {
        if self.tx.send(message).is_err() {
            debug!("Rendering surface is gone, directive batch dropped");
        }
    }
}

/// The rendering surface's end.
#[derive(Debug)]
pub struct ActionInbox {
    rx: mpsc::UnboundedReceiver<SurfaceMessage>,
}

impl ActionInbox {
    /// Next directive batch, or `None` once every handle is dropped.
    pub async fn recv(&mut self) -> Option<Vec<Directive>> {
        let message = self.rx.recv().await?;
        Some(Self::unpack(message))
    }

    /// Next batch if one is already waiting.
    pub fn try_recv(&mut self) -> Option<Vec<Directive>> {
        self.rx.try_recv().ok().map(Self::unpack)
    }

    fn unpack(message: SurfaceMessage) -> Vec<Directive> {
        match message {
            SurfaceMessage::AiActions { payload } => payload.into_directives(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_has_stable_type_tag() {
        let message = SurfaceMessage::actions(&[
            Directive::GotoPage { page: 2 },
            Directive::Highlight {
                page: 2,
                quote: "evaporation".into(),
            },
        ]);
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "ai-actions",
                "payload": {
                    "gotoPage": 2,
                    "highlights": [{"page": 2, "quote": "evaporation"}],
                    "circles": []
                }
            })
        );
    }

    #[test]
    fn other_message_types_are_rejected() {
        let parsed = serde_json::from_str::<SurfaceMessage>(r#"{"type":"chat","payload":{}}"#);
        assert!(parsed.is_err());
    }

    #[tokio::test]
    async fn batches_arrive_in_dispatch_order() {
        let (handle, mut inbox) = channel();
        handle.dispatch(&[Directive::GotoPage { page: 1 }]);
        handle.dispatch(&[Directive::GotoPage { page: 2 }]);

        assert_eq!(inbox.recv().await, Some(vec![Directive::GotoPage { page: 1 }]));
        assert_eq!(inbox.recv().await, Some(vec![Directive::GotoPage { page: 2 }]));
        assert_eq!(inbox.try_recv(), None);
    }

    #[tokio::test]
    async fn inbox_ends_when_handles_drop() {
        let (handle, mut inbox) = channel();
        let second = handle.clone();
        drop(handle);
        second.dispatch(&[]);
        drop(second);

        assert_eq!(inbox.recv().await, Some(vec![]));
        assert_eq!(inbox.recv().await, None);
    }

    #[test]
    fn dispatch_after_viewer_closed_is_inert() {
        let (handle, inbox) = channel();
        drop(inbox);
        handle.dispatch(&[Directive::GotoPage { page: 3 }]);
    }
}
