// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Record store wrapper that injects write failures.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use murmur_core::{AdapterType, HealthStatus, MurmurError, PluginAdapter, RecordStore, StoreOp};

/// Delegates to an inner store, failing writes on demand.
///
/// Reads always pass through, so tests can observe that a failed write
/// left the durable state untouched.
pub struct FlakyStore {
    inner: Arc<dyn RecordStore>,
    failing: AtomicBool,
    failed_writes: AtomicUsize,
}

impl FlakyStore {
    pub fn new(inner: Arc<dyn RecordStore>) -> Self {
        Self {
            inner,
            failing: AtomicBool::new(false),
            failed_writes: AtomicUsize::new(0),
        }
    }

    /// Switch write failures on or off.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of writes rejected so far.
    pub fn failed_writes(&self) -> usize {
        self.failed_writes.load(Ordering::SeqCst)
    }

    fn check_write(&self) -> Result<(), MurmurError> {
        if self.failing.load(Ordering::SeqCst) {
            self.failed_writes.fetch_add(1, Ordering::SeqCst);
            return Err(MurmurError::storage_msg("injected write failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl PluginAdapter for FlakyStore {
    fn name(&self) -> &str {
        "flaky"
    }

    fn version(&self) -> semver::Version {
        self.inner.version()
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::RecordStore
    }

    async fn health_check(&self) -> Result<HealthStatus, MurmurError> {
        if self.failing.load(Ordering::SeqCst) {
            return Ok(HealthStatus::Degraded("writes are failing".into()));
        }
        self.inner.health_check().await
    }

    async fn shutdown(&self) -> Result<(), MurmurError> {
        self.inner.shutdown().await
    }
}

#[async_trait]
impl RecordStore for FlakyStore {
    async fn initialize(&self) -> Result<(), MurmurError> {
        self.inner.initialize().await
    }

    async fn close(&self) -> Result<(), MurmurError> {
        self.inner.close().await
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), MurmurError> {
        self.check_write()?;
        self.inner.put(key, value).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, MurmurError> {
        self.inner.get(key).await
    }

    async fn remove(&self, key: &str) -> Result<bool, MurmurError> {
        self.check_write()?;
        self.inner.remove(key).await
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, MurmurError> {
        self.inner.list_keys(prefix).await
    }

    async fn apply(&self, ops: Vec<StoreOp>) -> Result<(), MurmurError> {
        self.check_write()?;
        self.inner.apply(ops).await
    }
}
