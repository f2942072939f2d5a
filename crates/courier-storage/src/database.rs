// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background thread.
//! Do NOT create additional Connection instances for writes.

use courier_core::CourierError;
use tracing::debug;

use crate::migrations::run_migrations;

/// Maps a tokio-rusqlite error into the store error variant.
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> CourierError {
    CourierError::store(e)
}

/// Single-writer handle to the SQLite database.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

impl Database {
    /// Opens (creating if needed) the database at `path`, applies PRAGMAs and
    /// runs pending migrations.
    pub async fn open(path: &str, wal_mode: bool) -> Result<Self, CourierError> {
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(CourierError::store)?;
            }
        }
        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(CourierError::store)?;
        let db = Self { conn };
        db.prepare(wal_mode).await?;
        debug!(path, wal_mode, "database opened");
        Ok(db)
    }

    /// In-memory database with the full schema, used by tests and tooling.
    pub async fn open_in_memory() -> Result<Self, CourierError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(CourierError::store)?;
        let db = Self { conn };
        db.prepare(false).await?;
        Ok(db)
    }

    async fn prepare(&self, wal_mode: bool) -> Result<(), CourierError> {
        self.conn
            .call(move |conn| -> Result<(), rusqlite::Error> {
                if wal_mode {
                    conn.pragma_update(None, "journal_mode", "WAL")?;
                }
                conn.pragma_update(None, "synchronous", "NORMAL")?;
                conn.pragma_update(None, "foreign_keys", "ON")?;
                conn.pragma_update(None, "busy_timeout", 5000)?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;

        self.conn
            .call(|conn| run_migrations(conn))
            .await
            .map_err(|e: tokio_rusqlite::Error<CourierError>| match e {
                tokio_rusqlite::Error::Error(inner) => inner,
                other => CourierError::store(other.to_string()),
            })
    }

    /// The underlying async connection. Query modules call through this.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoints the WAL so the main database file is self-contained.
    pub async fn checkpoint(&self) -> Result<(), CourierError> {
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

    /// Cheap liveness probe.
    pub async fn ping(&self) -> Result<(), CourierError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_creates_file_and_schema() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("courier.db");
        let db = Database::open(path.to_str().unwrap(), true).await.unwrap();
        assert!(path.exists());

        let tables = db
            .connection()
            .call(|conn| -> Result<Vec<String>, rusqlite::Error> {
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
                )?;
                let rows = stmt.query_map([], |row| row.get(0))?;
                rows.collect()
            })
            .await
            .unwrap();
        for table in ["credentials", "dispatches", "events"] {
            assert!(tables.iter().any(|t| t == table), "missing table {table}");
        }
    }

    #[tokio::test]
    async fn reopening_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("courier.db");
        let first = Database::open(path.to_str().unwrap(), true).await.unwrap();
        first.checkpoint().await.unwrap();
        drop(first);
        let second = Database::open(path.to_str().unwrap(), true).await.unwrap();
        second.ping().await.unwrap();
    }

    #[tokio::test]
    async fn wal_mode_is_enabled() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.db");
        let db = Database::open(path.to_str().unwrap(), true).await.unwrap();
        let mode = db
            .connection()
            .call(|conn| -> Result<String, rusqlite::Error> {
                conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))
            })
            .await
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }
}
