// SPDX-FileCopyrightText: 2026 Threadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background thread.
//! Do NOT create additional Connection instances for writes.

use std::path::Path;
use std::time::Duration;

use threadline_core::RelayError;
use tracing::debug;

use crate::migrations;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to the single SQLite writer connection.
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (creating if needed) the database at `path` and apply migrations.
    ///
    /// `:memory:` opens a private in-memory database.
    pub async fn open(path: &str, wal_mode: bool) -> Result<Self, RelayError> {
        let conn = if path == ":memory:" {
            tokio_rusqlite::Connection::open_in_memory()
                .await
                .map_err(RelayError::storage)?
        } else {
            let parent = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty());
            if let Some(parent) = parent {
                std::fs::create_dir_all(parent).map_err(RelayError::storage)?;
            }
            tokio_rusqlite::Connection::open(path)
                .await
                .map_err(RelayError::storage)?
        };

        conn.call(move |conn| -> Result<(), RelayError> {
            conn.busy_timeout(BUSY_TIMEOUT)
                .map_err(RelayError::storage)?;
            conn.pragma_update(None, "foreign_keys", true)
                .map_err(RelayError::storage)?;
            if wal_mode {
                let mode: String = conn
                    .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
                    .map_err(RelayError::storage)?;
                debug!(journal_mode = %mode, "journal mode set");
            }
            migrations::run_migrations(conn)
        })
        .await
        .map_err(RelayError::storage)?;

        debug!(path, wal_mode, "database opened");
        Ok(Self { conn })
    }

    /// The underlying async connection. Every query goes through `call`.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoint the WAL and close the connection.
    pub async fn close(self) -> Result<(), RelayError> {
        checkpoint(&self.conn).await?;
        self.conn.close().await.map_err(RelayError::storage)
    }
}

/// Fold the WAL back into the main database file.
pub(crate) async fn checkpoint(conn: &tokio_rusqlite::Connection) -> Result<(), RelayError> {
    conn.call(|conn| -> Result<(), rusqlite::Error> {
        conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
    })
    .await
    .map_err(map_tr_err)
}

/// Map a tokio-rusqlite error into the relay's storage variant.
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> RelayError {
    RelayError::storage(e)
}
