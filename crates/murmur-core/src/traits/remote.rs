// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Best-effort mirroring of local changes to a remote backend.

use async_trait::async_trait;

use crate::error::MurmurError;
use crate::traits::adapter::PluginAdapter;
use crate::types::Conversation;

/// Receives copies of local conversation changes.
///
/// Local storage is the source of truth. Callers log and discard any error
/// returned here; nothing is retried.
#[async_trait]
pub trait RemoteMirror: PluginAdapter {
    async fn mirror_create(&self, conversation: &Conversation) -> Result<(), MurmurError>;

    async fn mirror_update(&self, conversation: &Conversation) -> Result<(), MurmurError>;

    async fn mirror_delete(&self, conversation_id: &str) -> Result<(), MurmurError>;
}
