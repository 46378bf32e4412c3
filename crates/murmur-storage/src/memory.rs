// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory implementation of the RecordStore trait.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use murmur_core::{
    AdapterType, HealthStatus, MurmurError, PluginAdapter, RecordStore, StoreOp,
};

/// Volatile record store backed by a sorted map.
///
/// Ready for use on construction; `initialize` is a no-op. Nothing survives
/// the process, so "durable" here means visible to every later call.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<BTreeMap<String, String>>,
    closed: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    fn ensure_open(&self) -> Result<(), MurmurError> {
        if self.closed.load(Ordering::Acquire) {
            Err(MurmurError::storage_msg("record store is closed"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PluginAdapter for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::RecordStore
    }

    async fn health_check(&self) -> Result<HealthStatus, MurmurError> {
        Ok(match self.ensure_open() {
            Ok(()) => HealthStatus::Healthy,
            Err(e) => HealthStatus::Unhealthy(e.to_string()),
        })
    }

    async fn shutdown(&self) -> Result<(), MurmurError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn initialize(&self) -> Result<(), MurmurError> {
        self.ensure_open()
    }

    async fn close(&self) -> Result<(), MurmurError> {
        self.ensure_open()?;
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), MurmurError> {
        self.ensure_open()?;
        self.records
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, MurmurError> {
        self.ensure_open()?;
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn remove(&self, key: &str) -> Result<bool, MurmurError> {
        self.ensure_open()?;
        Ok(self.records.write().await.remove(key).is_some())
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, MurmurError> {
        self.ensure_open()?;
        Ok(self
            .records
            .read()
            .await
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn apply(&self, ops: Vec<StoreOp>) -> Result<(), MurmurError> {
        self.ensure_open()?;
        // One write guard for the whole batch, so readers see all or nothing.
        let mut records = self.records.write().await;
        for op in ops {
            match op {
                StoreOp::Put { key, value } => {
                    records.insert(key, value);
                }
                StoreOp::Remove { key } => {
                    records.remove(&key);
                }
            }
        }
        Ok(())
    }
}
