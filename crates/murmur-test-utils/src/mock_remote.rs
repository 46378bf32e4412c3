// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock remote mirror for deterministic testing.
//!
//! `MockRemote` implements `RemoteMirror` and captures every call so tests
//! can assert on what would have been forwarded to a remote service.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use murmur_core::{
    AdapterType, Conversation, HealthStatus, MurmurError, PluginAdapter, RemoteMirror,
};

/// One forwarded mirror call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    Create(String),
    Update(String),
    Delete(String),
}

/// A mock remote mirror for testing.
pub struct MockRemote {
    calls: Arc<Mutex<Vec<RemoteCall>>>,
    failing: AtomicBool,
    delay: Option<Duration>,
}

impl MockRemote {
    /// Create a mock that accepts every call immediately.
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            failing: AtomicBool::new(false),
            delay: None,
        }
    }

    /// Create a mock that sleeps for `delay` before answering each call.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new()
        }
    }

    /// Make subsequent calls fail (they are still recorded).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// All calls received so far, in order.
    pub async fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }

    pub async fn clear(&self) {
        self.calls.lock().await.clear();
    }

    async fn record(&self, call: RemoteCall) -> Result<(), MurmurError> {
        self.calls.lock().await.push(call);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            Err(MurmurError::Remote {
                message: "mock remote unavailable".into(),
                source: None,
            })
        } else {
            Ok(())
        }
    }
}

impl Default for MockRemote {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockRemote {
    fn name(&self) -> &str {
        "mock-remote"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::RemoteMirror
    }

    async fn health_check(&self) -> Result<HealthStatus, MurmurError> {
        if self.failing.load(Ordering::SeqCst) {
            Ok(HealthStatus::Degraded("mock remote failing".into()))
        } else {
            Ok(HealthStatus::Healthy)
        }
    }

    async fn shutdown(&self) -> Result<(), MurmurError> {
        Ok(())
    }
}

#[async_trait]
impl RemoteMirror for MockRemote {
    async fn mirror_create(&self, conversation: &Conversation) -> Result<(), MurmurError> {
        self.record(RemoteCall::Create(conversation.id.clone())).await
    }

    async fn mirror_update(&self, conversation: &Conversation) -> Result<(), MurmurError> {
        self.record(RemoteCall::Update(conversation.id.clone())).await
    }

    async fn mirror_delete(&self, conversation_id: &str) -> Result<(), MurmurError> {
        self.record(RemoteCall::Delete(conversation_id.to_string()))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_core::Timestamp;

    #[tokio::test]
    async fn records_calls_in_order() {
        let remote = MockRemote::new();
        let conv = Conversation::new("c1", "t", None, Timestamp::now());
        remote.mirror_create(&conv).await.unwrap();
        remote.mirror_update(&conv).await.unwrap();
        remote.mirror_delete("c1").await.unwrap();
        assert_eq!(
            remote.calls().await,
            vec![
                RemoteCall::Create("c1".into()),
                RemoteCall::Update("c1".into()),
                RemoteCall::Delete("c1".into()),
            ]
        );
    }

    #[tokio::test]
    async fn failing_mode_still_records() {
        let remote = MockRemote::new();
        remote.set_failing(true);
        assert!(remote.mirror_delete("c1").await.is_err());
        assert_eq!(remote.call_count().await, 1);
        assert!(matches!(
            remote.health_check().await.unwrap(),
            HealthStatus::Degraded(_)
        ));
    }
}
