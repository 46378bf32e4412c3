// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Best-effort forwarding of local changes to a remote mirror.
//!
//! Local storage is authoritative. Calls run off the caller's path, each is
//! bounded by a timeout, and any failure is logged and dropped. There is no
//! retry queue.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::{Instrument, debug, info_span, warn};

use murmur_config::model::RemoteConfig;
use murmur_core::{
    AdapterType, Conversation, HealthStatus, MurmurError, PluginAdapter, RemoteMirror,
};

/// Mirror that accepts everything and does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMirror;

#[async_trait]
impl PluginAdapter for NoopMirror {
    fn name(&self) -> &str {
        "noop"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::RemoteMirror
    }

    async fn health_check(&self) -> Result<HealthStatus, MurmurError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), MurmurError> {
        Ok(())
    }
}

#[async_trait]
impl RemoteMirror for NoopMirror {
    async fn mirror_create(&self, _conversation: &Conversation) -> Result<(), MurmurError> {
        Ok(())
    }

    async fn mirror_update(&self, _conversation: &Conversation) -> Result<(), MurmurError> {
        Ok(())
    }

    async fn mirror_delete(&self, _conversation_id: &str) -> Result<(), MurmurError> {
        Ok(())
    }
}

/// Capacity of the queue between the orchestrator and the mirror worker.
const QUEUE_CAPACITY: usize = 256;

enum RemoteJob {
    Create(Conversation),
    Update(Conversation),
    Delete(String),
    Flush(oneshot::Sender<()>),
}

/// Forwards changes to a [`RemoteMirror`] from a background worker.
///
/// Calls are queued and delivered in order by one task, each bounded by the
/// configured timeout, so a slow mirror never delays the local operation.
/// The worker starts on first use and stops once the sync is dropped.
pub struct RemoteSync {
    mirror: Arc<dyn RemoteMirror>,
    enabled: bool,
    timeout: Duration,
    worker: Mutex<Option<mpsc::Sender<RemoteJob>>>,
}

impl RemoteSync {
    pub fn new(mirror: Arc<dyn RemoteMirror>, config: &RemoteConfig) -> Self {
        Self {
            mirror,
            enabled: config.enabled,
            timeout: Duration::from_secs(config.timeout_secs),
            worker: Mutex::new(None),
        }
    }

    pub fn disabled() -> Self {
        Self {
            mirror: Arc::new(NoopMirror),
            enabled: false,
            timeout: Duration::from_secs(1),
            worker: Mutex::new(None),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn created(&self, conversation: &Conversation) {
        if self.enabled {
            self.enqueue(RemoteJob::Create(conversation.clone()));
        }
    }

    pub fn updated(&self, conversation: &Conversation) {
        if self.enabled {
            self.enqueue(RemoteJob::Update(conversation.clone()));
        }
    }

    pub fn deleted(&self, conversation_id: &str) {
        if self.enabled {
            self.enqueue(RemoteJob::Delete(conversation_id.to_string()));
        }
    }

    /// Waits until every call queued so far has been delivered or dropped.
    pub async fn flush(&self) {
        let running = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|s| !s.is_closed())
            .cloned();
        let Some(sender) = running else {
            return;
        };
        let (done, finished) = oneshot::channel();
        if sender.send(RemoteJob::Flush(done)).await.is_ok() {
            let _ = finished.await;
        }
    }

    fn enqueue(&self, job: RemoteJob) {
        let Some(sender) = self.sender() else {
            return;
        };
        match sender.try_send(job) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(job)) => warn!(
                action = job.action(),
                conversation_id = job.conversation_id(),
                "remote mirror queue full, dropping change"
            ),
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("remote mirror worker stopped, dropping change")
            }
        }
    }

    /// The worker's queue, spawning the worker if it is not running yet.
    fn sender(&self) -> Option<mpsc::Sender<RemoteJob>> {
        if !self.enabled {
            return None;
        }
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(sender) = worker.as_ref().filter(|s| !s.is_closed()) {
            return Some(sender.clone());
        }
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!(error = %e, "no async runtime, remote mirroring skipped");
                return None;
            }
        };
        let (sender, receiver) = mpsc::channel(QUEUE_CAPACITY);
        let span = info_span!("remote_mirror", mirror = self.mirror.name());
        runtime.spawn(run_worker(self.mirror.clone(), self.timeout, receiver).instrument(span));
        debug!(mirror = self.mirror.name(), "remote mirror worker started");
        *worker = Some(sender.clone());
        Some(sender)
    }
}

impl RemoteJob {
    fn action(&self) -> &'static str {
        match self {
            RemoteJob::Create(_) => "create",
            RemoteJob::Update(_) => "update",
            RemoteJob::Delete(_) => "delete",
            RemoteJob::Flush(_) => "flush",
        }
    }

    fn conversation_id(&self) -> &str {
        match self {
            RemoteJob::Create(c) | RemoteJob::Update(c) => &c.id,
            RemoteJob::Delete(id) => id,
            RemoteJob::Flush(_) => "",
        }
    }
}

async fn run_worker(
    mirror: Arc<dyn RemoteMirror>,
    timeout: Duration,
    mut jobs: mpsc::Receiver<RemoteJob>,
) {
    while let Some(job) = jobs.recv().await {
        let action = job.action();
        match job {
            RemoteJob::Create(c) => {
                let call = mirror.mirror_create(&c);
                forward(&*mirror, timeout, action, &c.id, call).await;
            }
            RemoteJob::Update(c) => {
                let call = mirror.mirror_update(&c);
                forward(&*mirror, timeout, action, &c.id, call).await;
            }
            RemoteJob::Delete(id) => {
                let call = mirror.mirror_delete(&id);
                forward(&*mirror, timeout, action, &id, call).await;
            }
            RemoteJob::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("remote mirror worker stopped");
}

async fn forward<F>(
    mirror: &dyn RemoteMirror,
    timeout: Duration,
    action: &'static str,
    conversation_id: &str,
    call: F,
) where
    F: Future<Output = Result<(), MurmurError>>,
{
    let outcome = match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(MurmurError::Timeout { duration: timeout }),
    };
    match outcome {
        Ok(()) => debug!(action, conversation_id, "remote mirror updated"),
        Err(e) => warn!(
            action,
            conversation_id,
            mirror = mirror.name(),
            error = %e,
            "remote mirror failed, continuing with local state"
        ),
    }
}
