// SPDX-FileCopyrightText: 2026 Threadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the relay, the storage layer and provider adapters.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Provider,
    Storage,
    Observability,
}

// --- Local records ---

/// Author role of a stored message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// Advisory capabilities of an agent. Enforced by callers, not by the relay.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Attachments,
    Voice,
}

/// A business tenant. Owns agents and conversations and caches the id of its
/// remote assistant once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Business {
    pub id: i64,
    pub name: String,
    pub assistant_id: Option<String>,
    pub created_at: String,
}

/// A configured AI agent belonging to a business. Read-only to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: i64,
    pub business_id: i64,
    pub name: String,
    pub instructions: String,
    pub model: String,
    pub capabilities: Vec<Capability>,
    pub created_at: String,
}

impl Agent {
    /// Whether the agent advertises the given capability.
    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

/// Input for creating an agent.
#[derive(Debug, Clone)]
pub struct NewAgent {
    pub business_id: i64,
    pub name: String,
    pub instructions: String,
    pub model: String,
    pub capabilities: Vec<Capability>,
}

/// Opaque conversation metadata. Holds the remote thread id once created;
/// any other keys are preserved untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A durable conversation between one user and one agent of a business.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: i64,
    pub business_id: i64,
    pub user_id: String,
    pub agent_id: i64,
    pub title: String,
    /// Unix epoch milliseconds of the last turn. Strictly increases per turn.
    pub last_activity_at: i64,
    pub metadata: ConversationMetadata,
    pub created_at: String,
}

impl Conversation {
    /// The remote thread bound to this conversation, if any.
    pub fn thread_id(&self) -> Option<&str> {
        self.metadata.thread_id.as_deref()
    }
}

/// Input for creating a conversation.
#[derive(Debug, Clone)]
pub struct NewConversation {
    pub business_id: i64,
    pub user_id: String,
    pub agent_id: i64,
    pub title: String,
}

/// Reference to a file already uploaded to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub file_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

/// A stored chat message. Immutable after creation except for `is_read`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub conversation_id: i64,
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub is_read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub created_at: String,
}

/// Input for inserting a message.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub conversation_id: i64,
    pub role: Role,
    pub content: String,
    pub attachments: Vec<Attachment>,
    pub metadata: Option<serde_json::Value>,
}

/// Payload handed from the submit request to the stream request through the
/// session token store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamSession {
    pub user_id: String,
    pub conversation_id: i64,
    pub user_message_id: i64,
    pub content: String,
    pub attachments: Vec<Attachment>,
}

// --- Remote (provider-side) resources ---

/// Lifecycle states of a remote run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Incomplete,
    Expired,
}

impl RunStatus {
    /// True once the run can no longer change state.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::Expired | Self::Incomplete
        )
    }
}

/// Error detail attached to a failed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFailure {
    pub code: String,
    pub message: String,
}

/// Snapshot of a remote run.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRun {
    pub id: String,
    pub thread_id: String,
    pub status: RunStatus,
    pub last_error: Option<RunFailure>,
}

/// Snapshot of the newest message in a remote thread, text parts concatenated.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteMessage {
    pub id: String,
    pub role: Role,
    pub run_id: Option<String>,
    pub text: String,
}

/// Parameters for lazily creating a remote assistant.
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantSpec {
    pub name: String,
    pub instructions: String,
    pub model: String,
}

/// A user message appended to a remote thread.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadMessageRequest {
    pub content: String,
    pub attachments: Vec<Attachment>,
    pub metadata: BTreeMap<String, String>,
}

/// One event of a push-based run stream.
#[derive(Debug, Clone, PartialEq)]
pub enum RunStreamEvent {
    /// Run state changed (created, queued, in progress, terminal...).
    Run(RemoteRun),
    /// Text appended to a message.
    MessageDelta { message_id: String, text: String },
    /// A message was finalized with its full text.
    MessageCompleted(RemoteMessage),
    /// The provider closed the stream.
    Done,
}
