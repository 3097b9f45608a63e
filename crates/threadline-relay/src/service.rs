// SPDX-FileCopyrightText: 2026 Threadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `ChatService`: the operations the HTTP surface exposes, wired over the
//! token store, binder, driver and relay.

use std::sync::Arc;
use std::time::Duration;

use threadline_config::model::RelayConfig;
use threadline_core::{
    AssistantProvider, Attachment, Capability, ChatStore, Conversation, Message, NewConversation,
    RelayError, Role, StreamSession,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::binder::ConversationBinder;
use crate::driver::{DriverSettings, RunDriver};
use crate::relay::{FrameStream, Frames, StreamRelay};
use crate::store::MessageStore;
use crate::token::{SessionTokenStore, generate_token, spawn_sweeper, token_prefix};

const FRAME_BUFFER: usize = 64;
const DEFAULT_TITLE: &str = "New conversation";

/// Result of submit-for-streaming.
#[derive(Debug, Clone)]
pub struct SubmitReceipt {
    pub message: Message,
    pub stream_token: String,
}

/// Result of the synchronous send path.
#[derive(Debug, Clone)]
pub struct SyncReply {
    pub user_message: Message,
    pub ai_message: Message,
}

pub struct ChatService {
    store: Arc<dyn ChatStore>,
    tokens: Arc<dyn SessionTokenStore>,
    messages: MessageStore,
    relay: Arc<StreamRelay>,
    token_ttl: Duration,
    sweep_every: Duration,
    shutdown: CancellationToken,
}

impl ChatService {
    pub fn new(
        store: Arc<dyn ChatStore>,
        provider: Arc<dyn AssistantProvider>,
        tokens: Arc<dyn SessionTokenStore>,
        config: &RelayConfig,
        shutdown: CancellationToken,
    ) -> Self {
        let binder = Arc::new(ConversationBinder::new(store.clone(), provider.clone()));
        let driver = RunDriver::new(provider, DriverSettings::from(config));
        let relay = StreamRelay::new(store.clone(), binder, driver, config);
        Self {
            messages: MessageStore::new(store.clone()),
            store,
            tokens,
            relay: Arc::new(relay),
            token_ttl: Duration::from_secs(config.token_ttl_secs),
            sweep_every: Duration::from_secs(config.token_sweep_secs),
            shutdown,
        }
    }

    /// Start purging expired session tokens until shutdown.
    pub fn spawn_token_sweeper(&self) -> JoinHandle<()> {
        spawn_sweeper(self.tokens.clone(), self.sweep_every, self.shutdown.clone())
    }

    /// Open a conversation between `user` and an agent of a business.
    pub async fn create_conversation(
        &self,
        user: &str,
        business_id: i64,
        agent_id: i64,
        title: Option<String>,
    ) -> Result<Conversation, RelayError> {
        self.store
            .get_business(business_id)
            .await?
            .ok_or_else(|| not_found("business", business_id))?;
        let agent = self
            .store
            .get_agent(agent_id)
            .await?
            .ok_or_else(|| not_found("agent", agent_id))?;
        if agent.business_id != business_id {
            return Err(RelayError::Input(format!(
                "agent {agent_id} does not belong to business {business_id}"
            )));
        }

        let title = title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_TITLE.to_string());
        let conversation = self
            .store
            .create_conversation(&NewConversation {
                business_id,
                user_id: user.to_string(),
                agent_id,
                title,
            })
            .await?;
        info!(conversation_id = conversation.id, business_id, agent_id, "conversation created");
        Ok(conversation)
    }

    /// Messages of a conversation in order. Assistant messages are marked read.
    pub async fn list_messages(
        &self,
        user: &str,
        conversation_id: i64,
    ) -> Result<Vec<Message>, RelayError> {
        self.owned_conversation(user, conversation_id).await?;
        let marked = self.store.mark_read(conversation_id, Role::Assistant).await?;
        debug!(conversation_id, marked, "assistant messages marked read");
        self.store.get_messages(conversation_id, None).await
    }

    /// Record the user's message and issue a single-use stream token for it.
    pub async fn submit_for_streaming(
        &self,
        user: &str,
        conversation_id: i64,
        content: &str,
        attachments: Vec<Attachment>,
    ) -> Result<SubmitReceipt, RelayError> {
        let (conversation, message) = self
            .record_turn_input(user, conversation_id, content, attachments)
            .await?;

        let session = StreamSession {
            user_id: user.to_string(),
            conversation_id: conversation.id,
            user_message_id: message.id,
            content: message.content.clone(),
            attachments: message.attachments.clone(),
        };
        let token = generate_token();
        self.tokens.put(&token, session, self.token_ttl).await?;
        threadline_prometheus::record_token_issued();
        info!(
            conversation_id,
            message_id = message.id,
            token = token_prefix(&token),
            "stream token issued"
        );

        Ok(SubmitReceipt {
            message,
            stream_token: token,
        })
    }

    /// Consume `token` and start relaying its turn.
    ///
    /// Token and conversation problems fail here, before any frame. Dropping
    /// the returned stream cancels the turn.
    pub async fn open_stream(&self, token: &str) -> Result<FrameStream, RelayError> {
        let session = self.tokens.take(token).await?;
        let conversation = self
            .owned_conversation(&session.user_id, session.conversation_id)
            .await?;

        let (tx, rx) = mpsc::channel(FRAME_BUFFER);
        let cancel = self.shutdown.child_token();
        let relay = self.relay.clone();
        let turn_cancel = cancel.clone();
        debug!(
            conversation_id = conversation.id,
            token = token_prefix(token),
            "stream opened"
        );
        tokio::spawn(async move {
            if let Err(e) = relay
                .execute(&session, &conversation, Frames::to(&tx), turn_cancel)
                .await
            {
                debug!(conversation_id = conversation.id, error = %e, "relayed turn ended without reply");
            }
        });

        Ok(FrameStream::new(rx, cancel))
    }

    /// Run a whole turn without a push channel.
    ///
    /// Provider failures still yield an assistant message holding the
    /// fallback text.
    pub async fn send_sync(
        &self,
        user: &str,
        conversation_id: i64,
        content: &str,
        attachments: Vec<Attachment>,
    ) -> Result<SyncReply, RelayError> {
        let (conversation, user_message) = self
            .record_turn_input(user, conversation_id, content, attachments)
            .await?;
        let session = StreamSession {
            user_id: user.to_string(),
            conversation_id,
            user_message_id: user_message.id,
            content: user_message.content.clone(),
            attachments: user_message.attachments.clone(),
        };

        // The caller dropping this future abandons the turn.
        let cancel = self.shutdown.child_token();
        let _abandon = cancel.clone().drop_guard();
        let ai_message = self
            .relay
            .execute(&session, &conversation, Frames::none(), cancel)
            .await?;
        Ok(SyncReply {
            user_message,
            ai_message,
        })
    }

    async fn record_turn_input(
        &self,
        user: &str,
        conversation_id: i64,
        content: &str,
        attachments: Vec<Attachment>,
    ) -> Result<(Conversation, Message), RelayError> {
        if content.trim().is_empty() {
            return Err(RelayError::Input("message content must not be empty".into()));
        }
        let conversation = self.owned_conversation(user, conversation_id).await?;

        if !attachments.is_empty() {
            let agent = self
                .store
                .get_agent(conversation.agent_id)
                .await?
                .ok_or_else(|| not_found("agent", conversation.agent_id))?;
            if !agent.supports(Capability::Attachments) {
                warn!(conversation_id, agent_id = agent.id, "attachments rejected by agent capabilities");
                return Err(RelayError::Input("this agent does not accept attachments".into()));
            }
        }

        let message = self
            .messages
            .record_user_message(&conversation, user, content, attachments)
            .await?;
        Ok((conversation, message))
    }

    async fn owned_conversation(
        &self,
        user: &str,
        conversation_id: i64,
    ) -> Result<Conversation, RelayError> {
        let conversation = self
            .store
            .get_conversation(conversation_id)
            .await?
            .ok_or_else(|| not_found("conversation", conversation_id))?;
        if conversation.user_id != user {
            warn!(conversation_id, "conversation accessed by non-owner");
            return Err(RelayError::forbidden("conversation belongs to another user"));
        }
        Ok(conversation)
    }
}

fn not_found(kind: &'static str, id: i64) -> RelayError {
    RelayError::NotFound {
        kind,
        id: id.to_string(),
    }
}
