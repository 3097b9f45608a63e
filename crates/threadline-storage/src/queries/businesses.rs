// SPDX-FileCopyrightText: 2026 Threadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Business operations, including the write-once remote assistant id.

use rusqlite::{OptionalExtension, params};
use threadline_core::{Business, RelayError};

use crate::database::{Database, map_tr_err};

const BUSINESS_COLUMNS: &str = "id, name, assistant_id, created_at";

fn business_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Business> {
    Ok(Business {
        id: row.get(0)?,
        name: row.get(1)?,
        assistant_id: row.get(2)?,
        created_at: row.get(3)?,
    })
}

pub async fn create_business(db: &Database, name: &str) -> Result<Business, RelayError> {
    let name = name.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("INSERT INTO businesses (name) VALUES (?1) RETURNING {BUSINESS_COLUMNS}"),
                params![name],
                business_from_row,
            )
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_business(db: &Database, id: i64) -> Result<Option<Business>, RelayError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {BUSINESS_COLUMNS} FROM businesses WHERE id = ?1"),
                params![id],
                business_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Store `assistant_id` unless the business already has one, returning the
/// id that is stored afterwards.
pub async fn set_assistant_id_if_absent(
    db: &Database,
    business_id: i64,
    assistant_id: &str,
) -> Result<String, RelayError> {
    let assistant_id = assistant_id.to_string();
    let stored = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "UPDATE businesses SET assistant_id = ?1 WHERE id = ?2 AND assistant_id IS NULL",
                params![assistant_id, business_id],
            )?;
            let stored: Option<Option<String>> = tx
                .query_row(
                    "SELECT assistant_id FROM businesses WHERE id = ?1",
                    params![business_id],
                    |row| row.get(0),
                )
                .optional()?;
            tx.commit()?;
            Ok(stored.flatten())
        })
        .await
        .map_err(map_tr_err)?;

    stored.ok_or_else(|| RelayError::NotFound {
        kind: "business",
        id: business_id.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_and_get_business() {
        let db = Database::open(":memory:", false).await.unwrap();
        let created = create_business(&db, "Acme").await.unwrap();
        assert!(created.id > 0);
        assert_eq!(created.assistant_id, None);

        let fetched = get_business(&db, created.id).await.unwrap().unwrap();
        assert_eq!(fetched, created);
        assert!(get_business(&db, created.id + 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn assistant_id_is_write_once() {
        let db = Database::open(":memory:", false).await.unwrap();
        let business = create_business(&db, "Acme").await.unwrap();

        let first = set_assistant_id_if_absent(&db, business.id, "asst_1")
            .await
            .unwrap();
        let second = set_assistant_id_if_absent(&db, business.id, "asst_2")
            .await
            .unwrap();
        assert_eq!(first, "asst_1");
        assert_eq!(second, "asst_1");

        let stored = get_business(&db, business.id).await.unwrap().unwrap();
        assert_eq!(stored.assistant_id.as_deref(), Some("asst_1"));
    }

    #[tokio::test]
    async fn assistant_id_on_missing_business_is_not_found() {
        let db = Database::open(":memory:", false).await.unwrap();
        let err = set_assistant_id_if_absent(&db, 404, "asst_1")
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::NotFound { kind: "business", .. }));
    }
}
