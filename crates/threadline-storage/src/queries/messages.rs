// SPDX-FileCopyrightText: 2026 Threadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message operations. Messages are insert-only apart from the read flag.

use rusqlite::params;
use threadline_core::{Message, NewMessage, RelayError, Role};

use crate::database::{Database, map_tr_err};
use crate::queries::{enum_column, optional_json_column};

fn message_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        role: enum_column(row, 2)?,
        content: row.get(3)?,
        attachments: optional_json_column(row, 4)?.unwrap_or_default(),
        is_read: row.get(5)?,
        metadata: optional_json_column(row, 6)?,
        created_at: row.get(7)?,
    })
}

/// Insert a message and return the stored row.
pub async fn insert_message(db: &Database, message: &NewMessage) -> Result<Message, RelayError> {
    let attachments = if message.attachments.is_empty() {
        None
    } else {
        Some(serde_json::to_string(&message.attachments).map_err(RelayError::storage)?)
    };
    let metadata = message
        .metadata
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(RelayError::storage)?;
    let conversation_id = message.conversation_id;
    let role = message.role.to_string();
    let content = message.content.clone();

    db.connection()
        .call(move |conn| {
            conn.query_row(
                "INSERT INTO messages (conversation_id, role, content, attachments, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 RETURNING id, conversation_id, role, content, attachments, is_read, metadata, created_at",
                params![conversation_id, role, content, attachments, metadata],
                message_from_row,
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Messages of a conversation in insertion order, optionally capped at `limit`.
pub async fn get_messages_for_conversation(
    db: &Database,
    conversation_id: i64,
    limit: Option<i64>,
) -> Result<Vec<Message>, RelayError> {
    // SQLite treats a negative LIMIT as unbounded.
    let limit = limit.unwrap_or(-1);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, conversation_id, role, content, attachments, is_read, metadata, created_at
                 FROM messages WHERE conversation_id = ?1
                 ORDER BY id ASC LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![conversation_id, limit], message_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Mark unread messages of `role` as read, returning how many changed.
pub async fn mark_read(db: &Database, conversation_id: i64, role: Role) -> Result<usize, RelayError> {
    let role = role.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE messages SET is_read = 1
                 WHERE conversation_id = ?1 AND role = ?2 AND is_read = 0",
                params![conversation_id, role],
            )
        })
        .await
        .map_err(map_tr_err)
}
