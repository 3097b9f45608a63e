// SPDX-FileCopyrightText: 2026 Threadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation binder: lazily creates the remote assistant of a business and
//! the remote thread of a conversation, caching their ids locally.
//!
//! Creation is serialized per business and per conversation inside this
//! process, and the local writes are write-once. A remote create that
//! succeeds followed by a failed local write still leaves an orphaned remote
//! resource; the next turn creates a fresh one.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use threadline_core::{
    Agent, AssistantProvider, AssistantSpec, Business, ChatStore, Conversation, RelayError,
};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

type LockMap = DashMap<i64, Arc<Mutex<()>>>;

pub struct ConversationBinder {
    store: Arc<dyn ChatStore>,
    provider: Arc<dyn AssistantProvider>,
    conversation_locks: LockMap,
    business_locks: LockMap,
}

impl ConversationBinder {
    pub fn new(store: Arc<dyn ChatStore>, provider: Arc<dyn AssistantProvider>) -> Self {
        Self {
            store,
            provider,
            conversation_locks: DashMap::new(),
            business_locks: DashMap::new(),
        }
    }

    /// Return the remote thread bound to `conversation`, creating it if absent.
    pub async fn ensure_thread(&self, conversation: &Conversation) -> Result<String, RelayError> {
        if let Some(thread_id) = conversation.thread_id() {
            return Ok(thread_id.to_string());
        }

        let lease = LockLease::acquire(&self.conversation_locks, conversation.id);
        let _guard = lease.lock.lock().await;

        // Another turn may have bound the thread while we waited.
        let current = self
            .store
            .get_conversation(conversation.id)
            .await?
            .ok_or_else(|| RelayError::NotFound {
                kind: "conversation",
                id: conversation.id.to_string(),
            })?;
        if let Some(thread_id) = current.thread_id() {
            debug!(conversation_id = conversation.id, thread_id, "thread bound concurrently");
            return Ok(thread_id.to_string());
        }

        let metadata = BTreeMap::from([
            ("conversation_id".to_string(), conversation.id.to_string()),
            ("business_id".to_string(), conversation.business_id.to_string()),
        ]);
        let created = self.provider.create_thread(&metadata).await?;

        let stored = self
            .store
            .set_thread_id_if_absent(conversation.id, &created)
            .await
            .inspect_err(|e| {
                error!(
                    conversation_id = conversation.id,
                    thread_id = %created,
                    error = %e,
                    "remote thread created but not recorded"
                );
            })?;
        if stored != created {
            warn!(
                conversation_id = conversation.id,
                kept = %stored,
                orphaned = %created,
                "conversation already had a thread, discarding new one"
            );
        } else {
            info!(conversation_id = conversation.id, thread_id = %stored, "bound remote thread");
        }
        Ok(stored)
    }

    /// Return the remote assistant of `business`, creating it from `agent` if absent.
    pub async fn ensure_assistant(
        &self,
        business: &Business,
        agent: &Agent,
    ) -> Result<String, RelayError> {
        if let Some(assistant_id) = &business.assistant_id {
            return Ok(assistant_id.clone());
        }

        let lease = LockLease::acquire(&self.business_locks, business.id);
        let _guard = lease.lock.lock().await;

        let current = self
            .store
            .get_business(business.id)
            .await?
            .ok_or_else(|| RelayError::NotFound {
                kind: "business",
                id: business.id.to_string(),
            })?;
        if let Some(assistant_id) = current.assistant_id {
            return Ok(assistant_id);
        }

        let spec = AssistantSpec {
            name: agent.name.clone(),
            instructions: agent.instructions.clone(),
            model: agent.model.clone(),
        };
        let created = self.provider.create_assistant(&spec).await?;
        let stored = self
            .store
            .set_assistant_id_if_absent(business.id, &created)
            .await
            .inspect_err(|e| {
                error!(
                    business_id = business.id,
                    assistant_id = %created,
                    error = %e,
                    "remote assistant created but not recorded"
                );
            })?;
        info!(business_id = business.id, assistant_id = %stored, "bound remote assistant");
        Ok(stored)
    }
}

/// Shared handle on the lock of one id. The map entry is removed when the
/// last lease is dropped, so the maps only hold ids with a bind in flight.
struct LockLease<'a> {
    locks: &'a LockMap,
    id: i64,
    lock: Arc<Mutex<()>>,
}

impl<'a> LockLease<'a> {
    fn acquire(locks: &'a LockMap, id: i64) -> Self {
        let lock = locks.entry(id).or_default().clone();
        Self { locks, id, lock }
    }
}

impl Drop for LockLease<'_> {
    fn drop(&mut self) {
        // Two references left: the map's and this lease's.
        self.locks
            .remove_if(&self.id, |_, lock| Arc::strong_count(lock) == 2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use threadline_test_utils::{ScriptedProvider, TestStore};

    #[tokio::test]
    async fn creates_thread_once_then_reuses_it() {
        let seeded = TestStore::new().await.unwrap();
        let provider = Arc::new(ScriptedProvider::default());
        let binder = ConversationBinder::new(seeded.store.clone(), provider.clone());

        let first = binder.ensure_thread(&seeded.conversation).await.unwrap();
        assert_eq!(provider.threads_created(), 1);

        let reloaded = seeded.reload_conversation().await.unwrap();
        assert_eq!(reloaded.thread_id(), Some(first.as_str()));

        let second = binder.ensure_thread(&reloaded).await.unwrap();
        assert_eq!(second, first);
        assert_eq!(provider.threads_created(), 1);
    }

    #[tokio::test]
    async fn stale_snapshot_does_not_create_second_thread() {
        let seeded = TestStore::new().await.unwrap();
        let provider = Arc::new(ScriptedProvider::default());
        let binder = ConversationBinder::new(seeded.store.clone(), provider.clone());

        binder.ensure_thread(&seeded.conversation).await.unwrap();
        // Same stale snapshot without a thread id.
        binder.ensure_thread(&seeded.conversation).await.unwrap();
        assert_eq!(provider.threads_created(), 1);
    }

    #[tokio::test]
    async fn concurrent_first_turns_share_one_thread() {
        let seeded = TestStore::new().await.unwrap();
        let provider = Arc::new(ScriptedProvider::default());
        let binder = Arc::new(ConversationBinder::new(
            seeded.store.clone(),
            provider.clone(),
        ));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let binder = binder.clone();
                let conversation = seeded.conversation.clone();
                tokio::spawn(async move { binder.ensure_thread(&conversation).await })
            })
            .collect();

        let mut ids = Vec::new();
        for task in tasks {
            ids.push(task.await.unwrap().unwrap());
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(provider.threads_created(), 1);
        assert!(binder.conversation_locks.is_empty());
    }

    #[tokio::test]
    async fn lock_entries_are_released_after_binding() {
        let seeded = TestStore::new().await.unwrap();
        let provider = Arc::new(ScriptedProvider::default());
        let binder = ConversationBinder::new(seeded.store.clone(), provider.clone());

        binder.ensure_thread(&seeded.conversation).await.unwrap();
        binder
            .ensure_assistant(&seeded.business, &seeded.agent)
            .await
            .unwrap();
        assert!(binder.conversation_locks.is_empty());
        assert!(binder.business_locks.is_empty());

        // Stale snapshots take the locked re-read path.
        binder.ensure_thread(&seeded.conversation).await.unwrap();
        binder
            .ensure_assistant(&seeded.business, &seeded.agent)
            .await
            .unwrap();
        assert!(binder.conversation_locks.is_empty());
        assert!(binder.business_locks.is_empty());
        assert_eq!(provider.threads_created(), 1);
        assert_eq!(provider.assistants_created(), 1);
    }

    #[test]
    fn waiting_lease_keeps_entry_until_last_holder_leaves() {
        let locks = LockMap::new();
        let first = LockLease::acquire(&locks, 7);
        let second = LockLease::acquire(&locks, 7);
        assert!(Arc::ptr_eq(&first.lock, &second.lock));

        drop(first);
        assert_eq!(locks.len(), 1);
        drop(second);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn assistant_built_from_agent_and_cached() {
        let seeded = TestStore::new().await.unwrap();
        let provider = Arc::new(ScriptedProvider::default());
        let binder = ConversationBinder::new(seeded.store.clone(), provider.clone());

        let id = binder
            .ensure_assistant(&seeded.business, &seeded.agent)
            .await
            .unwrap();
        let again = binder
            .ensure_assistant(&seeded.business, &seeded.agent)
            .await
            .unwrap();
        assert_eq!(id, again);
        assert_eq!(provider.assistants_created(), 1);

        let specs = provider.assistant_specs().await;
        assert_eq!(specs[0].name, seeded.agent.name);
        assert_eq!(specs[0].instructions, seeded.agent.instructions);
        assert_eq!(specs[0].model, seeded.agent.model);
    }
}
