// SPDX-FileCopyrightText: 2026 Threadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Data written through one store instance survives a reopen.

use threadline_config::model::StorageConfig;
use threadline_core::{ChatStore, NewAgent, NewConversation, NewMessage, Role};
use threadline_storage::SqliteStorage;

fn config(path: &std::path::Path) -> StorageConfig {
    StorageConfig {
        database_path: path.to_str().unwrap().to_string(),
        wal_mode: true,
    }
}

#[tokio::test]
async fn conversation_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("threadline.db");

    let conversation_id = {
        let store = SqliteStorage::new(config(&path));
        store.initialize().await.unwrap();
        let business = store.create_business("Acme").await.unwrap();
        store
            .set_assistant_id_if_absent(business.id, "asst_1")
            .await
            .unwrap();
        let agent = store
            .create_agent(&NewAgent {
                business_id: business.id,
                name: "Helper".into(),
                instructions: "Be brief.".into(),
                model: "gpt-4o-mini".into(),
                capabilities: Vec::new(),
            })
            .await
            .unwrap();
        let conversation = store
            .create_conversation(&NewConversation {
                business_id: business.id,
                user_id: "alice".into(),
                agent_id: agent.id,
                title: "Billing".into(),
            })
            .await
            .unwrap();
        store
            .set_thread_id_if_absent(conversation.id, "thread_1")
            .await
            .unwrap();
        store
            .insert_message(&NewMessage {
                conversation_id: conversation.id,
                role: Role::User,
                content: "Where is my invoice?".into(),
                attachments: Vec::new(),
                metadata: None,
            })
            .await
            .unwrap();
        store.close().await.unwrap();
        conversation.id
    };

    let store = SqliteStorage::new(config(&path));
    store.initialize().await.unwrap();
    let conversation = store.get_conversation(conversation_id).await.unwrap().unwrap();
    assert_eq!(conversation.thread_id(), Some("thread_1"));

    let business = store
        .get_business(conversation.business_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(business.assistant_id.as_deref(), Some("asst_1"));

    let messages = store.get_messages(conversation_id, None).await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].content, "Where is my invoice?");
}
