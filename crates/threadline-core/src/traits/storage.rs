// SPDX-FileCopyrightText: 2026 Threadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for the durable message store.

use async_trait::async_trait;

use crate::error::RelayError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    Agent, Business, Conversation, Message, NewAgent, NewConversation, NewMessage, Role,
};

/// Adapter for the durable record of businesses, agents, conversations and messages.
///
/// Messages are insert-only. Conversation metadata is only ever extended, and
/// the remote thread id is write-once.
#[async_trait]
pub trait ChatStore: PluginAdapter {
    /// Initializes the storage backend (migrations, connection, etc.).
    async fn initialize(&self) -> Result<(), RelayError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), RelayError>;

    // --- Businesses and agents ---

    async fn create_business(&self, name: &str) -> Result<Business, RelayError>;

    async fn get_business(&self, id: i64) -> Result<Option<Business>, RelayError>;

    /// Caches the remote assistant id on a business unless one is already set.
    ///
    /// Returns the id that is stored after the call, which is the existing
    /// one if another writer got there first.
    async fn set_assistant_id_if_absent(
        &self,
        business_id: i64,
        assistant_id: &str,
    ) -> Result<String, RelayError>;

    async fn create_agent(&self, agent: &NewAgent) -> Result<Agent, RelayError>;

    async fn get_agent(&self, id: i64) -> Result<Option<Agent>, RelayError>;

    // --- Conversations ---

    async fn create_conversation(
        &self,
        conversation: &NewConversation,
    ) -> Result<Conversation, RelayError>;

    async fn get_conversation(&self, id: i64) -> Result<Option<Conversation>, RelayError>;

    /// Writes the remote thread id into conversation metadata unless already set.
    ///
    /// Returns the id that is stored after the call.
    async fn set_thread_id_if_absent(
        &self,
        conversation_id: i64,
        thread_id: &str,
    ) -> Result<String, RelayError>;

    /// Bumps the last-activity timestamp, guaranteeing a strictly larger value.
    async fn touch_conversation(&self, conversation_id: i64) -> Result<i64, RelayError>;

    // --- Messages ---

    async fn insert_message(&self, message: &NewMessage) -> Result<Message, RelayError>;

    async fn get_messages(
        &self,
        conversation_id: i64,
        limit: Option<i64>,
    ) -> Result<Vec<Message>, RelayError>;

    /// Marks every unread message of `role` in a conversation as read.
    async fn mark_read(&self, conversation_id: i64, role: Role) -> Result<usize, RelayError>;
}
