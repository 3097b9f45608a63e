// SPDX-FileCopyrightText: 2026 Threadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the ChatStore trait.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use threadline_config::model::StorageConfig;
use threadline_core::{
    AdapterType, Agent, Business, ChatStore, Conversation, HealthStatus, Message, NewAgent,
    NewConversation, NewMessage, PluginAdapter, RelayError, Role,
};

use crate::database::{self, Database, map_tr_err};
use crate::queries;

/// SQLite-backed message store.
///
/// Wraps a [`Database`] handle and delegates all query operations to the
/// typed query modules. The database is opened on the first call to
/// [`ChatStore::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create a new SqliteStorage. The connection is not opened yet.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    fn db(&self) -> Result<&Database, RelayError> {
        self.db.get().ok_or_else(|| RelayError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, RelayError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> { conn.execute_batch("SELECT 1;") })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), RelayError> {
        if let Some(db) = self.db.get() {
            database::checkpoint(db.connection()).await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl ChatStore for SqliteStorage {
    async fn initialize(&self) -> Result<(), RelayError> {
        let db = Database::open(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| RelayError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), RelayError> {
        database::checkpoint(self.db()?.connection()).await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    async fn create_business(&self, name: &str) -> Result<Business, RelayError> {
        queries::businesses::create_business(self.db()?, name).await
    }

    async fn get_business(&self, id: i64) -> Result<Option<Business>, RelayError> {
        queries::businesses::get_business(self.db()?, id).await
    }

    async fn set_assistant_id_if_absent(
        &self,
        business_id: i64,
        assistant_id: &str,
    ) -> Result<String, RelayError> {
        queries::businesses::set_assistant_id_if_absent(self.db()?, business_id, assistant_id).await
    }

    async fn create_agent(&self, agent: &NewAgent) -> Result<Agent, RelayError> {
        queries::agents::create_agent(self.db()?, agent).await
    }

    async fn get_agent(&self, id: i64) -> Result<Option<Agent>, RelayError> {
        queries::agents::get_agent(self.db()?, id).await
    }

    async fn create_conversation(
        &self,
        conversation: &NewConversation,
    ) -> Result<Conversation, RelayError> {
        queries::conversations::create_conversation(self.db()?, conversation).await
    }

    async fn get_conversation(&self, id: i64) -> Result<Option<Conversation>, RelayError> {
        queries::conversations::get_conversation(self.db()?, id).await
    }

    async fn set_thread_id_if_absent(
        &self,
        conversation_id: i64,
        thread_id: &str,
    ) -> Result<String, RelayError> {
        queries::conversations::set_thread_id_if_absent(self.db()?, conversation_id, thread_id)
            .await
    }

    async fn touch_conversation(&self, conversation_id: i64) -> Result<i64, RelayError> {
        queries::conversations::touch_conversation(self.db()?, conversation_id).await
    }

    async fn insert_message(&self, message: &NewMessage) -> Result<Message, RelayError> {
        queries::messages::insert_message(self.db()?, message).await
    }

    async fn get_messages(
        &self,
        conversation_id: i64,
        limit: Option<i64>,
    ) -> Result<Vec<Message>, RelayError> {
        queries::messages::get_messages_for_conversation(self.db()?, conversation_id, limit).await
    }

    async fn mark_read(&self, conversation_id: i64, role: Role) -> Result<usize, RelayError> {
        queries::messages::mark_read(self.db()?, conversation_id, role).await
    }
}
