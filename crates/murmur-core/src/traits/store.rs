// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable key/value storage trait.

use async_trait::async_trait;

use crate::error::MurmurError;
use crate::traits::adapter::PluginAdapter;

/// A single write inside an atomic batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    Put { key: String, value: String },
    Remove { key: String },
}

impl StoreOp {
    pub fn put(key: impl Into<String>, value: impl Into<String>) -> Self {
        StoreOp::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn remove(key: impl Into<String>) -> Self {
        StoreOp::Remove { key: key.into() }
    }

    pub fn key(&self) -> &str {
        match self {
            StoreOp::Put { key, .. } | StoreOp::Remove { key } => key,
        }
    }
}

/// Durable string key -> string value storage.
///
/// Implementations must make a write durable before returning `Ok`, and must
/// report a missing key as `Ok(None)` rather than an error.
#[async_trait]
pub trait RecordStore: PluginAdapter {
    /// Opens the backend (connection, migrations). Must be called before any other operation.
    async fn initialize(&self) -> Result<(), MurmurError>;

    /// Flushes pending writes and releases the backend.
    async fn close(&self) -> Result<(), MurmurError>;

    /// Inserts or replaces the value stored under `key`.
    async fn put(&self, key: &str, value: &str) -> Result<(), MurmurError>;

    /// Fetches the value stored under `key`, or `None` if absent.
    async fn get(&self, key: &str) -> Result<Option<String>, MurmurError>;

    /// Deletes `key`. Returns whether a value was present.
    async fn remove(&self, key: &str) -> Result<bool, MurmurError>;

    /// Lists every key starting with `prefix`, in ascending order.
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, MurmurError>;

    /// Applies every operation in `ops` atomically: all succeed or none do.
    async fn apply(&self, ops: Vec<StoreOp>) -> Result<(), MurmurError>;
}
