// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background thread.
//! Do NOT create additional Connection instances for writes.

use std::path::Path;
use std::time::Duration;

use murmur_config::model::StorageConfig;
use murmur_core::MurmurError;
use tracing::{debug, info};

use crate::migrations::run_migrations;

/// Handle to the single SQLite connection backing a store.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open the database at `path` with default settings (WAL, 5s busy timeout).
    pub async fn open(path: &str) -> Result<Self, MurmurError> {
        Self::open_with(&StorageConfig {
            database_path: path.to_string(),
            ..StorageConfig::default()
        })
        .await
    }

    /// Open the database described by `config`, creating parent directories
    /// and applying pending migrations.
    pub async fn open_with(config: &StorageConfig) -> Result<Self, MurmurError> {
        if let Some(parent) = Path::new(&config.database_path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(MurmurError::storage)?;
        }

        let conn = tokio_rusqlite::Connection::open(&config.database_path)
            .await
            .map_err(|e| MurmurError::storage_msg(format!("failed to open database: {e}")))?;

        let wal_mode = config.wal_mode;
        let busy_timeout = Duration::from_millis(config.busy_timeout_ms);
        conn.call(
            move |conn| -> Result<Result<(), MurmurError>, rusqlite::Error> {
                conn.busy_timeout(busy_timeout)?;
                if wal_mode {
                    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
                }
                // FULL makes a committed write durable before the call returns.
                conn.execute_batch("PRAGMA synchronous = FULL;")?;
                Ok(run_migrations(conn))
            },
        )
        .await
        .map_err(map_tr_err)??;

        info!(path = %config.database_path, wal_mode, "database opened");
        Ok(Self { conn })
    }

    /// The shared connection. Clones refer to the same background thread.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Flush the WAL into the main database file.
    pub async fn checkpoint(&self) -> Result<(), MurmurError> {
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

    /// Checkpoint and close the connection. Later calls on any clone fail.
    pub async fn close(&self) -> Result<(), MurmurError> {
        self.checkpoint().await?;
        self.conn
            .clone()
            .close()
            .await
            .map_err(|e| MurmurError::storage_msg(format!("failed to close database: {e}")))?;
        debug!("database closed");
        Ok(())
    }
}

/// Maps a tokio-rusqlite failure to a storage error.
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> MurmurError {
    MurmurError::storage_msg(format!("database error: {e}"))
}
