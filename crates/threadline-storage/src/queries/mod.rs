// SPDX-FileCopyrightText: 2026 Threadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules for operations on storage entities.

pub mod agents;
pub mod businesses;
pub mod conversations;
pub mod messages;

use rusqlite::Row;
use rusqlite::types::Type;
use serde::de::DeserializeOwned;

/// Decode a JSON text column, surfacing parse failures as conversion errors.
pub(crate) fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Like [`json_column`] for nullable columns.
pub(crate) fn optional_json_column<T: DeserializeOwned>(
    row: &Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<T>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| {
        serde_json::from_str(&raw)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

/// Parse a strum-backed enum stored as text.
pub(crate) fn enum_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = strum::ParseError>,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Current time as unix epoch milliseconds.
pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
pub(crate) mod fixtures {
    use threadline_core::{Agent, Business, Capability, Conversation, NewAgent, NewConversation};

    use crate::database::Database;

    pub struct Seeded {
        pub db: Database,
        pub business: Business,
        pub agent: Agent,
        pub conversation: Conversation,
    }

    /// In-memory database with one business, agent and conversation.
    pub async fn seeded() -> Seeded {
        let db = Database::open(":memory:", false).await.unwrap();
        let business = super::businesses::create_business(&db, "Acme").await.unwrap();
        let agent = super::agents::create_agent(
            &db,
            &NewAgent {
                business_id: business.id,
                name: "Helper".into(),
                instructions: "Answer briefly.".into(),
                model: "gpt-4o-mini".into(),
                capabilities: vec![Capability::Attachments],
            },
        )
        .await
        .unwrap();
        let conversation = super::conversations::create_conversation(
            &db,
            &NewConversation {
                business_id: business.id,
                user_id: "alice".into(),
                agent_id: agent.id,
                title: "Support".into(),
            },
        )
        .await
        .unwrap();
        Seeded {
            db,
            business,
            agent,
            conversation,
        }
    }
}
