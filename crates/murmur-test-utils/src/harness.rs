// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles an orchestrator over a temp SQLite database (or
//! an in-memory store), wrapped in a [`FlakyStore`] and wired to a
//! [`MockRemote`]. `restart()` simulates a process relaunch over the same
//! persisted data.

use std::path::PathBuf;
use std::sync::Arc;

use murmur_config::MurmurConfig;
use murmur_conversation::ConversationOrchestrator;
use murmur_core::{MurmurError, RecordStore};
use murmur_storage::{MemoryStore, SqliteStore};

use crate::flaky_store::FlakyStore;
use crate::mock_remote::MockRemote;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    config: MurmurConfig,
    in_memory: bool,
    remote_enabled: bool,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            config: MurmurConfig::default(),
            in_memory: false,
            remote_enabled: false,
        }
    }

    /// Use an in-memory store instead of a temp SQLite database.
    pub fn with_memory_store(mut self) -> Self {
        self.in_memory = true;
        self
    }

    /// Forward changes to the harness's mock remote.
    pub fn with_remote(mut self) -> Self {
        self.remote_enabled = true;
        self
    }

    /// Start from a custom configuration. The storage path is always
    /// replaced with one inside the harness temp directory.
    pub fn with_config(mut self, config: MurmurConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the test harness and restore its (empty) mirror.
    pub async fn build(self) -> Result<TestHarness, MurmurError> {
        let temp_dir = tempfile::TempDir::new().map_err(MurmurError::storage)?;
        let mut config = self.config;
        config.storage.database_path = temp_dir
            .path()
            .join("murmur.db")
            .to_string_lossy()
            .to_string();
        config.remote.enabled = self.remote_enabled;

        let memory: Option<Arc<dyn RecordStore>> = if self.in_memory {
            Some(Arc::new(MemoryStore::new()))
        } else {
            None
        };
        let remote = Arc::new(MockRemote::new());
        let (store, orchestrator) = open_stack(&config, memory.clone(), remote.clone()).await?;

        Ok(TestHarness {
            orchestrator,
            store,
            remote,
            config,
            memory,
            _temp_dir: temp_dir,
        })
    }
}

async fn open_stack(
    config: &MurmurConfig,
    memory: Option<Arc<dyn RecordStore>>,
    remote: Arc<MockRemote>,
) -> Result<(Arc<FlakyStore>, Arc<ConversationOrchestrator>), MurmurError> {
    let inner = match memory {
        Some(store) => store,
        None => Arc::new(SqliteStore::new(config.storage.clone())) as Arc<dyn RecordStore>,
    };
    let store = Arc::new(FlakyStore::new(inner));
    let orchestrator = ConversationOrchestrator::open(store.clone(), remote, config).await?;
    Ok((store, Arc::new(orchestrator)))
}

/// A complete test environment with mock adapters and temp storage.
pub struct TestHarness {
    /// The orchestrator under test.
    pub orchestrator: Arc<ConversationOrchestrator>,
    /// Store wrapper used to inject write failures.
    pub store: Arc<FlakyStore>,
    /// Captures everything forwarded to the remote mirror.
    pub remote: Arc<MockRemote>,
    /// Effective configuration.
    pub config: MurmurConfig,
    memory: Option<Arc<dyn RecordStore>>,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Path of the SQLite database (unused with an in-memory store).
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.config.storage.database_path)
    }

    /// Simulates a relaunch: the current orchestrator is closed and a new
    /// one is opened over the same persisted data.
    pub async fn restart(&mut self) -> Result<(), MurmurError> {
        // A closed memory store rejects every call, so only SQLite is closed.
        if self.memory.is_none() {
            self.orchestrator.close().await?;
        }
        let (store, orchestrator) =
            open_stack(&self.config, self.memory.clone(), self.remote.clone()).await?;
        self.store = store;
        self.orchestrator = orchestrator;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_core::NewMessage;

    #[tokio::test]
    async fn sqlite_harness_survives_restart() {
        let mut harness = TestHarness::builder().build().await.unwrap();
        let conv = harness
            .orchestrator
            .create_conversation(None, None)
            .await
            .unwrap();
        harness
            .orchestrator
            .add_message(&conv.id, NewMessage::user("still here?"))
            .await
            .unwrap();
        assert!(harness.database_path().exists());

        harness.restart().await.unwrap();
        let active = harness.orchestrator.active().await.unwrap();
        assert_eq!(active.id, conv.id);
        assert_eq!(active.messages[0].content, "still here?");
    }

    #[tokio::test]
    async fn memory_harness_survives_restart() {
        let mut harness = TestHarness::builder()
            .with_memory_store()
            .build()
            .await
            .unwrap();
        harness
            .orchestrator
            .create_conversation(None, None)
            .await
            .unwrap();
        harness.restart().await.unwrap();
        assert_eq!(harness.orchestrator.conversations().await.len(), 1);
    }
}
