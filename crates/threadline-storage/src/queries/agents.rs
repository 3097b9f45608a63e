// SPDX-FileCopyrightText: 2026 Threadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Agent operations.

use rusqlite::{OptionalExtension, params};
use threadline_core::{Agent, NewAgent, RelayError};

use crate::database::{Database, map_tr_err};
use crate::queries::json_column;

fn agent_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Agent> {
    Ok(Agent {
        id: row.get(0)?,
        business_id: row.get(1)?,
        name: row.get(2)?,
        instructions: row.get(3)?,
        model: row.get(4)?,
        capabilities: json_column(row, 5)?,
        created_at: row.get(6)?,
    })
}

pub async fn create_agent(db: &Database, agent: &NewAgent) -> Result<Agent, RelayError> {
    let agent = agent.clone();
    let capabilities = serde_json::to_string(&agent.capabilities).map_err(RelayError::storage)?;
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "INSERT INTO agents (business_id, name, instructions, model, capabilities)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 RETURNING id, business_id, name, instructions, model, capabilities, created_at",
                params![
                    agent.business_id,
                    agent.name,
                    agent.instructions,
                    agent.model,
                    capabilities,
                ],
                agent_from_row,
            )
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_agent(db: &Database, id: i64) -> Result<Option<Agent>, RelayError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT id, business_id, name, instructions, model, capabilities, created_at
                 FROM agents WHERE id = ?1",
                params![id],
                agent_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}
