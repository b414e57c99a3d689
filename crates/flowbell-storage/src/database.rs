// SPDX-FileCopyrightText: 2026 FlowBell Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background thread.
//! Do NOT create additional Connection instances for writes.

use std::path::Path;

use flowbell_core::FlowbellError;
use tracing::{debug, info};

use crate::migrations::run_migrations;

/// Convert a tokio-rusqlite error into FlowbellError::Storage.
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> FlowbellError {
    FlowbellError::Storage {
        source: Box::new(e),
    }
}

/// Current wall-clock time in epoch milliseconds.
pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Handle to the FlowBell SQLite database.
pub struct Database {
    conn: tokio_rusqlite::Connection,
    path: String,
}

impl Database {
    /// Open (creating if needed) the database at `path` in WAL mode and apply
    /// pending migrations.
    pub async fn open(path: &str) -> Result<Self, FlowbellError> {
        Self::open_with(path, true).await
    }

    /// Like [`Database::open`], choosing the journal mode explicitly.
    pub async fn open_with(path: &str, wal_mode: bool) -> Result<Self, FlowbellError> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(FlowbellError::storage)?;
            }
        }

        // Migrations run on a plain blocking connection before the async
        // handle is opened, so the schema is complete when queries start.
        let migrate_path = path.to_string();
        tokio::task::spawn_blocking(move || -> Result<(), FlowbellError> {
            let mut conn =
                rusqlite::Connection::open(&migrate_path).map_err(FlowbellError::storage)?;
            apply_pragmas(&conn, wal_mode).map_err(FlowbellError::storage)?;
            run_migrations(&mut conn)
        })
        .await
        .map_err(|e| FlowbellError::Internal(format!("migration task panicked: {e}")))??;

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| FlowbellError::Storage {
                source: Box::new(e),
            })?;
        conn.call(move |conn| apply_pragmas(conn, wal_mode))
            .await
            .map_err(map_tr_err)?;

        info!(path, wal_mode, "database opened");
        Ok(Self {
            conn,
            path: path.to_string(),
        })
    }

    /// The single async connection all queries go through.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Checkpoint the WAL into the main database file.
    pub async fn checkpoint(&self) -> Result<(), FlowbellError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    /// Checkpoint and close the connection.
    pub async fn close(self) -> Result<(), FlowbellError> {
        self.checkpoint().await?;
        self.conn.close().await.map_err(FlowbellError::storage)?;
        debug!(path = %self.path, "database closed");
        Ok(())
    }
}

fn apply_pragmas(conn: &rusqlite::Connection, wal_mode: bool) -> Result<(), rusqlite::Error> {
    let journal = if wal_mode { "WAL" } else { "DELETE" };
    conn.pragma_update_and_check(None, "journal_mode", journal, |row| {
        row.get::<_, String>(0)
    })?;
    conn.execute_batch(
        "PRAGMA synchronous = NORMAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;",
    )?;
    Ok(())
}
