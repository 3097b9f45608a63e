// SPDX-FileCopyrightText: 2026 Threadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message store integration: the only writes the relay makes to message
//! history. Both records are plain inserts.

use std::sync::Arc;

use threadline_core::{
    Attachment, ChatStore, Conversation, Message, NewMessage, RelayError, Role,
};
use tracing::debug;

#[derive(Clone)]
pub struct MessageStore {
    store: Arc<dyn ChatStore>,
}

impl MessageStore {
    pub fn new(store: Arc<dyn ChatStore>) -> Self {
        Self { store }
    }

    /// Insert the user's side of a turn.
    ///
    /// Rejects blank content and authors other than the conversation owner
    /// before anything is written.
    pub async fn record_user_message(
        &self,
        conversation: &Conversation,
        author: &str,
        text: &str,
        attachments: Vec<Attachment>,
    ) -> Result<Message, RelayError> {
        if text.trim().is_empty() {
            return Err(RelayError::Input("message content must not be empty".into()));
        }
        if conversation.user_id != author {
            return Err(RelayError::forbidden("conversation belongs to another user"));
        }

        let message = self
            .store
            .insert_message(&NewMessage {
                conversation_id: conversation.id,
                role: Role::User,
                content: text.to_string(),
                attachments,
                metadata: None,
            })
            .await?;
        debug!(conversation_id = conversation.id, message_id = message.id, "user message recorded");
        Ok(message)
    }

    /// Insert the assistant's side of a turn, either the generated reply or
    /// the fallback text.
    pub async fn record_assistant_message(
        &self,
        conversation_id: i64,
        text: &str,
        metadata: serde_json::Value,
    ) -> Result<Message, RelayError> {
        if text.is_empty() {
            return Err(RelayError::Input("assistant content must not be empty".into()));
        }
        let message = self
            .store
            .insert_message(&NewMessage {
                conversation_id,
                role: Role::Assistant,
                content: text.to_string(),
                attachments: Vec::new(),
                metadata: Some(metadata),
            })
            .await?;
        debug!(conversation_id, message_id = message.id, "assistant message recorded");
        Ok(message)
    }
}
