// SPDX-FileCopyrightText: 2026 Threadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation operations.
//!
//! Metadata is a JSON object. The remote thread id lives under `thread_id`
//! and is written at most once; every other key is left untouched.

use rusqlite::{OptionalExtension, params};
use threadline_core::{Conversation, NewConversation, RelayError};

use crate::database::{Database, map_tr_err};
use crate::queries::{json_column, now_millis};

const CONVERSATION_COLUMNS: &str =
    "id, business_id, user_id, agent_id, title, last_activity_at, metadata, created_at";

fn conversation_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: row.get(0)?,
        business_id: row.get(1)?,
        user_id: row.get(2)?,
        agent_id: row.get(3)?,
        title: row.get(4)?,
        last_activity_at: row.get(5)?,
        metadata: json_column(row, 6)?,
        created_at: row.get(7)?,
    })
}

fn not_found(id: i64) -> RelayError {
    RelayError::NotFound {
        kind: "conversation",
        id: id.to_string(),
    }
}

pub async fn create_conversation(
    db: &Database,
    conversation: &NewConversation,
) -> Result<Conversation, RelayError> {
    let conversation = conversation.clone();
    let now = now_millis();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!(
                    "INSERT INTO conversations (business_id, user_id, agent_id, title, last_activity_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     RETURNING {CONVERSATION_COLUMNS}"
                ),
                params![
                    conversation.business_id,
                    conversation.user_id,
                    conversation.agent_id,
                    conversation.title,
                    now,
                ],
                conversation_from_row,
            )
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_conversation(db: &Database, id: i64) -> Result<Option<Conversation>, RelayError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1"),
                params![id],
                conversation_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Write `thread_id` into the conversation metadata unless one is present,
/// returning the thread id stored afterwards.
pub async fn set_thread_id_if_absent(
    db: &Database,
    conversation_id: i64,
    thread_id: &str,
) -> Result<String, RelayError> {
    let thread_id = thread_id.to_string();
    let stored = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "UPDATE conversations
                 SET metadata = json_set(metadata, '$.thread_id', ?1)
                 WHERE id = ?2 AND json_extract(metadata, '$.thread_id') IS NULL",
                params![thread_id, conversation_id],
            )?;
            let stored: Option<Option<String>> = tx
                .query_row(
                    "SELECT json_extract(metadata, '$.thread_id') FROM conversations WHERE id = ?1",
                    params![conversation_id],
                    |row| row.get(0),
                )
                .optional()?;
            tx.commit()?;
            Ok(stored.flatten())
        })
        .await
        .map_err(map_tr_err)?;

    stored.ok_or_else(|| not_found(conversation_id))
}

/// Bump `last_activity_at` to now, or one millisecond past its current value
/// when the clock has not moved forward.
pub async fn touch_conversation(db: &Database, conversation_id: i64) -> Result<i64, RelayError> {
    let now = now_millis();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "UPDATE conversations
                 SET last_activity_at = MAX(?1, last_activity_at + 1)
                 WHERE id = ?2
                 RETURNING last_activity_at",
                params![now, conversation_id],
                |row| row.get(0),
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)?
        .ok_or_else(|| not_found(conversation_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::fixtures::seeded;

    #[tokio::test]
    async fn new_conversation_has_empty_metadata() {
        let seeded = seeded().await;
        let conversation = get_conversation(&seeded.db, seeded.conversation.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(conversation.user_id, "alice");
        assert_eq!(conversation.thread_id(), None);
        assert!(conversation.last_activity_at > 0);
    }

    #[tokio::test]
    async fn thread_id_is_never_overwritten() {
        let seeded = seeded().await;
        let id = seeded.conversation.id;

        assert_eq!(
            set_thread_id_if_absent(&seeded.db, id, "thread_a").await.unwrap(),
            "thread_a"
        );
        assert_eq!(
            set_thread_id_if_absent(&seeded.db, id, "thread_b").await.unwrap(),
            "thread_a"
        );

        let conversation = get_conversation(&seeded.db, id).await.unwrap().unwrap();
        assert_eq!(conversation.thread_id(), Some("thread_a"));
    }

    #[tokio::test]
    async fn thread_id_write_keeps_other_metadata() {
        let seeded = seeded().await;
        let id = seeded.conversation.id;
        seeded
            .db
            .connection()
            .call(move |conn| -> Result<usize, rusqlite::Error> {
                conn.execute(
                    "UPDATE conversations SET metadata = '{\"source\":\"widget\"}' WHERE id = ?1",
                    params![id],
                )
            })
            .await
            .unwrap();

        set_thread_id_if_absent(&seeded.db, id, "thread_a").await.unwrap();
        let conversation = get_conversation(&seeded.db, id).await.unwrap().unwrap();
        assert_eq!(conversation.metadata.extra["source"], "widget");
        assert_eq!(conversation.thread_id(), Some("thread_a"));
    }

    #[tokio::test]
    async fn touch_strictly_increases() {
        let seeded = seeded().await;
        let id = seeded.conversation.id;

        let mut last = seeded.conversation.last_activity_at;
        for _ in 0..5 {
            let next = touch_conversation(&seeded.db, id).await.unwrap();
            assert!(next > last, "{next} should exceed {last}");
            last = next;
        }
    }

    #[tokio::test]
    async fn touch_missing_conversation_is_not_found() {
        let seeded = seeded().await;
        let err = touch_conversation(&seeded.db, 9999).await.unwrap_err();
        assert!(matches!(err, RelayError::NotFound { kind: "conversation", .. }));
    }
}
