// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the RecordStore trait.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use murmur_config::model::StorageConfig;
use murmur_core::{
    AdapterType, HealthStatus, MurmurError, PluginAdapter, RecordStore, StoreOp,
};

use crate::database::Database;
use crate::queries;

/// SQLite-backed record store.
///
/// Wraps a [`Database`] handle and delegates all operations to the typed
/// query modules. The database is opened on the first call to
/// [`RecordStore::initialize`] and is unusable after [`RecordStore::close`].
pub struct SqliteStore {
    config: StorageConfig,
    db: OnceCell<Database>,
    closed: AtomicBool,
}

impl SqliteStore {
    /// Create a new SqliteStore with the given configuration.
    ///
    /// The database connection is not opened until `initialize` is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Path of the backing database file.
    pub fn path(&self) -> &str {
        &self.config.database_path
    }

    /// Number of stored records, for diagnostics.
    pub async fn record_count(&self) -> Result<u64, MurmurError> {
        queries::kv::count(self.db()?).await
    }

    /// Returns the underlying Database, or an error if not open.
    fn db(&self) -> Result<&Database, MurmurError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(MurmurError::storage_msg("record store is closed"));
        }
        self.db.get().ok_or_else(|| {
            MurmurError::storage_msg("record store not initialized -- call initialize() first")
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::RecordStore
    }

    async fn health_check(&self) -> Result<HealthStatus, MurmurError> {
        let db = match self.db() {
            Ok(db) => db,
            Err(e) => return Ok(HealthStatus::Unhealthy(e.to_string())),
        };
        let probe = db
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await;
        Ok(match probe {
            Ok(()) => HealthStatus::Healthy,
            Err(e) => HealthStatus::Unhealthy(format!("probe failed: {e}")),
        })
    }

    async fn shutdown(&self) -> Result<(), MurmurError> {
        if self.db.get().is_some() && !self.closed.load(Ordering::Acquire) {
            self.close().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn initialize(&self) -> Result<(), MurmurError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(MurmurError::storage_msg("record store is closed"));
        }
        let db = Database::open_with(&self.config).await?;
        self.db
            .set(db)
            .map_err(|_| MurmurError::storage_msg("record store already initialized"))?;
        debug!(path = %self.config.database_path, "SQLite record store initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), MurmurError> {
        let db = self.db()?;
        self.closed.store(true, Ordering::Release);
        db.close().await
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), MurmurError> {
        queries::kv::put(self.db()?, key, value).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, MurmurError> {
        queries::kv::get(self.db()?, key).await
    }

    async fn remove(&self, key: &str) -> Result<bool, MurmurError> {
        queries::kv::remove(self.db()?, key).await
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, MurmurError> {
        queries::kv::list_keys(self.db()?, prefix).await
    }

    async fn apply(&self, ops: Vec<StoreOp>) -> Result<(), MurmurError> {
        queries::kv::apply(self.db()?, ops).await
    }
}
