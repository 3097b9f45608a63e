// SPDX-FileCopyrightText: 2026 Threadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stream relay: runs one turn end to end and reports it as frames.
//!
//! Frame order for a turn is `start`, `chunk`*, then either
//! `complete`, `message_saved` or `error`, and always a final `done`.
//! Exactly one assistant message is persisted per turn that is not
//! cancelled: the generated reply, or the fallback text on failure.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use futures::Stream;
use threadline_config::model::RelayConfig;
use threadline_core::{ChatStore, Conversation, Message, RelayError, StreamSession};
use threadline_prometheus::{TurnOutcome, record_chunk, record_turn};
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, warn};

use crate::binder::ConversationBinder;
use crate::driver::{RunDriver, RunEvent, RunOutcome, Turn};
use crate::store::MessageStore;

/// Sentinel carried by the terminal frame.
pub const DONE_SENTINEL: &str = "[DONE]";

/// One server-sent frame of a relayed turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayFrame {
    Start,
    Chunk { content: String },
    Complete { content: String },
    MessageSaved { message_id: i64 },
    Error { message: String },
    Done,
}

impl RelayFrame {
    /// SSE `event:` name.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Chunk { .. } => "chunk",
            Self::Complete { .. } => "complete",
            Self::MessageSaved { .. } => "message_saved",
            Self::Error { .. } => "error",
            Self::Done => "done",
        }
    }

    /// SSE `data:` payload.
    pub fn data(&self) -> String {
        let json = match self {
            Self::Start => serde_json::json!({}),
            Self::Chunk { content } | Self::Complete { content } => {
                serde_json::json!({ "content": content })
            }
            Self::MessageSaved { message_id } => serde_json::json!({ "message_id": message_id }),
            Self::Error { message } => serde_json::json!({ "message": message }),
            Self::Done => return DONE_SENTINEL.to_string(),
        };
        json.to_string()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }
}

/// Frames of one relayed turn. Dropping it cancels the turn.
pub struct FrameStream {
    rx: mpsc::Receiver<RelayFrame>,
    _guard: DropGuard,
}

impl FrameStream {
    pub(crate) fn new(rx: mpsc::Receiver<RelayFrame>, cancel: CancellationToken) -> Self {
        Self {
            rx,
            _guard: cancel.drop_guard(),
        }
    }
}

impl Stream for FrameStream {
    type Item = RelayFrame;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

/// Optional frame sink. `None` for the synchronous send path.
#[derive(Clone, Copy)]
pub struct Frames<'a>(Option<&'a mpsc::Sender<RelayFrame>>);

impl<'a> Frames<'a> {
    pub fn to(tx: &'a mpsc::Sender<RelayFrame>) -> Self {
        Self(Some(tx))
    }

    pub fn none() -> Self {
        Self(None)
    }

    /// Returns false when the client is gone.
    async fn send(self, frame: RelayFrame) -> bool {
        match self.0 {
            Some(tx) => tx.send(frame).await.is_ok(),
            None => true,
        }
    }
}

pub struct StreamRelay {
    store: Arc<dyn ChatStore>,
    binder: Arc<ConversationBinder>,
    driver: RunDriver,
    messages: MessageStore,
    fallback_message: String,
    error_message: String,
}

impl StreamRelay {
    pub fn new(
        store: Arc<dyn ChatStore>,
        binder: Arc<ConversationBinder>,
        driver: RunDriver,
        config: &RelayConfig,
    ) -> Self {
        Self {
            messages: MessageStore::new(store.clone()),
            store,
            binder,
            driver,
            fallback_message: config.fallback_message.clone(),
            error_message: config.error_message.clone(),
        }
    }

    /// Relay one turn described by `session` on `conversation`.
    ///
    /// Returns the persisted assistant message, which holds the fallback text
    /// when the turn failed. Returns `Cancelled` without persisting anything
    /// when `cancel` fires or the client leaves before the reply is complete.
    pub async fn execute(
        &self,
        session: &StreamSession,
        conversation: &Conversation,
        frames: Frames<'_>,
        cancel: CancellationToken,
    ) -> Result<Message, RelayError> {
        let started = Instant::now();
        let conversation_id = conversation.id;

        let result = if frames.send(RelayFrame::Start).await {
            self.drive(session, conversation, frames, &cancel).await
        } else {
            Err(RelayError::Cancelled)
        };

        let (message, outcome) = match result {
            Ok(run) => {
                let saved = self.finish_success(conversation, run, frames).await;
                let outcome = if saved.is_ok() {
                    TurnOutcome::Completed
                } else {
                    TurnOutcome::Failed
                };
                (saved, outcome)
            }
            Err(RelayError::Cancelled) => {
                info!(conversation_id, "turn cancelled, nothing persisted");
                record_turn(TurnOutcome::Cancelled, started.elapsed());
                return Err(RelayError::Cancelled);
            }
            Err(e) => (
                self.finish_failure(conversation_id, &e, frames).await,
                TurnOutcome::Failed,
            ),
        };

        record_turn(outcome, started.elapsed());
        frames.send(RelayFrame::Done).await;
        message
    }

    async fn drive(
        &self,
        session: &StreamSession,
        conversation: &Conversation,
        frames: Frames<'_>,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, RelayError> {
        let business = self
            .store
            .get_business(conversation.business_id)
            .await?
            .ok_or_else(|| RelayError::NotFound {
                kind: "business",
                id: conversation.business_id.to_string(),
            })?;
        let agent = self
            .store
            .get_agent(conversation.agent_id)
            .await?
            .ok_or_else(|| RelayError::NotFound {
                kind: "agent",
                id: conversation.agent_id.to_string(),
            })?;

        let assistant_id = self.binder.ensure_assistant(&business, &agent).await?;
        let thread_id = self.binder.ensure_thread(conversation).await?;

        let turn = Turn {
            conversation_id: conversation.id,
            business_id: conversation.business_id,
            thread_id,
            assistant_id,
            content: session.content.clone(),
            attachments: session.attachments.clone(),
        };
        let mut events = self.driver.spawn(turn, cancel.child_token());

        while let Some(event) = events.recv().await {
            match event? {
                RunEvent::Delta(content) => {
                    record_chunk();
                    if !frames.send(RelayFrame::Chunk { content }).await {
                        debug!(conversation_id = conversation.id, "client gone mid-turn");
                        cancel.cancel();
                        return Err(RelayError::Cancelled);
                    }
                }
                RunEvent::Completed(outcome) => return Ok(outcome),
            }
        }
        Err(RelayError::Internal("run driver stopped without a result".into()))
    }

    async fn finish_success(
        &self,
        conversation: &Conversation,
        outcome: RunOutcome,
        frames: Frames<'_>,
    ) -> Result<Message, RelayError> {
        // From here on the reply is persisted even if the client has left.
        frames
            .send(RelayFrame::Complete {
                content: outcome.text.clone(),
            })
            .await;

        let persisted = async {
            let message = self
                .messages
                .record_assistant_message(
                    conversation.id,
                    &outcome.text,
                    serde_json::json!({
                        "thread_id": outcome.thread_id,
                        "run_id": outcome.run_id,
                    }),
                )
                .await?;
            self.store.touch_conversation(conversation.id).await?;
            if conversation.thread_id() != Some(outcome.thread_id.as_str()) {
                self.store
                    .set_thread_id_if_absent(conversation.id, &outcome.thread_id)
                    .await?;
            }
            Ok::<_, RelayError>(message)
        }
        .await;

        match persisted {
            Ok(message) => {
                info!(
                    conversation_id = conversation.id,
                    message_id = message.id,
                    run_id = %outcome.run_id,
                    "assistant reply saved"
                );
                frames
                    .send(RelayFrame::MessageSaved {
                        message_id: message.id,
                    })
                    .await;
                Ok(message)
            }
            Err(e) => {
                error!(conversation_id = conversation.id, error = %e, "failed to save assistant reply");
                frames
                    .send(RelayFrame::Error {
                        message: self.error_message.clone(),
                    })
                    .await;
                Err(e)
            }
        }
    }

    async fn finish_failure(
        &self,
        conversation_id: i64,
        cause: &RelayError,
        frames: Frames<'_>,
    ) -> Result<Message, RelayError> {
        error!(conversation_id, kind = cause.kind(), error = %cause, "turn failed, saving fallback reply");
        frames
            .send(RelayFrame::Error {
                message: self.error_message.clone(),
            })
            .await;

        let message = self
            .messages
            .record_assistant_message(
                conversation_id,
                &self.fallback_message,
                serde_json::json!({ "error_kind": cause.kind() }),
            )
            .await
            .inspect_err(|e| error!(conversation_id, error = %e, "failed to save fallback reply"))?;
        if let Err(e) = self.store.touch_conversation(conversation_id).await {
            warn!(conversation_id, error = %e, "failed to bump conversation activity");
        }
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_names_and_payloads() {
        assert_eq!(RelayFrame::Start.event_name(), "start");
        assert_eq!(RelayFrame::Start.data(), "{}");

        let chunk = RelayFrame::Chunk {
            content: "Hi \"you\"".into(),
        };
        assert_eq!(chunk.event_name(), "chunk");
        let parsed: serde_json::Value = serde_json::from_str(&chunk.data()).unwrap();
        assert_eq!(parsed["content"], "Hi \"you\"");

        let saved = RelayFrame::MessageSaved { message_id: 42 };
        assert_eq!(saved.event_name(), "message_saved");
        assert_eq!(saved.data(), r#"{"message_id":42}"#);

        let error = RelayFrame::Error {
            message: "try again".into(),
        };
        assert_eq!(error.data(), r#"{"message":"try again"}"#);
    }

    #[test]
    fn done_frame_carries_sentinel() {
        assert_eq!(RelayFrame::Done.event_name(), "done");
        assert_eq!(RelayFrame::Done.data(), DONE_SENTINEL);
        assert!(RelayFrame::Done.is_terminal());
        assert!(!RelayFrame::Start.is_terminal());
    }

    #[tokio::test]
    async fn dropping_frame_stream_cancels() {
        let (_tx, rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let stream = FrameStream::new(rx, cancel.clone());
        assert!(!cancel.is_cancelled());
        drop(stream);
        assert!(cancel.is_cancelled());
    }
}
