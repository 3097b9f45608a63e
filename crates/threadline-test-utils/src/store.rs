// SPDX-FileCopyrightText: 2026 Threadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Temp-file SQLite store with seed data.

use std::sync::Arc;

use threadline_config::model::StorageConfig;
use threadline_core::{
    Agent, Business, Capability, ChatStore, Conversation, NewAgent, NewConversation, RelayError,
};
use threadline_storage::SqliteStorage;

/// An initialized [`SqliteStorage`] in a temp directory, seeded with one
/// business, one agent and one conversation owned by `alice`.
///
/// The directory is removed when the value is dropped.
pub struct TestStore {
    pub store: Arc<SqliteStorage>,
    pub business: Business,
    pub agent: Agent,
    pub conversation: Conversation,
    _dir: tempfile::TempDir,
}

impl TestStore {
    pub const OWNER: &'static str = "alice";

    pub async fn new() -> Result<Self, RelayError> {
        Self::with_capabilities(vec![Capability::Attachments]).await
    }

    /// Seed an agent advertising exactly `capabilities`.
    pub async fn with_capabilities(capabilities: Vec<Capability>) -> Result<Self, RelayError> {
        let dir = tempfile::TempDir::new().map_err(RelayError::storage)?;
        let store = SqliteStorage::new(StorageConfig {
            database_path: dir.path().join("test.db").to_string_lossy().into_owned(),
            wal_mode: true,
        });
        store.initialize().await?;

        let business = store.create_business("Acme").await?;
        let agent = store
            .create_agent(&NewAgent {
                business_id: business.id,
                name: "Acme Helper".into(),
                instructions: "Answer customer questions politely.".into(),
                model: "gpt-4o-mini".into(),
                capabilities,
            })
            .await?;
        let conversation = store
            .create_conversation(&NewConversation {
                business_id: business.id,
                user_id: Self::OWNER.into(),
                agent_id: agent.id,
                title: "Support".into(),
            })
            .await?;

        Ok(Self {
            store: Arc::new(store),
            business,
            agent,
            conversation,
            _dir: dir,
        })
    }

    /// Re-read the seeded conversation.
    pub async fn reload_conversation(&self) -> Result<Conversation, RelayError> {
        self.store
            .get_conversation(self.conversation.id)
            .await?
            .ok_or_else(|| RelayError::NotFound {
                kind: "conversation",
                id: self.conversation.id.to_string(),
            })
    }
}
