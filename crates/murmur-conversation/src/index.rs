// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Secondary index of conversation metadata.
//!
//! The index is one persisted collection under `conversations.index`, so
//! listing conversations never decodes full records. Entries are ordered by
//! last activity (newest first), ties broken by id.
//!
//! The in-memory copy is loaded lazily and only replaced after the matching
//! store write succeeds. Writers that must update a record and the index
//! together lock the index, stage the new collection, persist both in one
//! batch, then commit the staged entries.

use std::cmp::Ordering;
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use murmur_core::{Conversation, ConversationMetadata, MurmurError, RecordStore, StoreOp};
use murmur_storage::{codec, keys};

/// Display order: most recent activity first, then id for stability.
pub fn display_order(a: &ConversationMetadata, b: &ConversationMetadata) -> Ordering {
    b.last_activity
        .cmp(&a.last_activity)
        .then_with(|| a.id.cmp(&b.id))
}

/// A fully prepared replacement for the persisted index.
#[derive(Debug, Clone)]
pub struct StagedIndex {
    entries: Vec<ConversationMetadata>,
    encoded: String,
}

impl StagedIndex {
    fn new(mut entries: Vec<ConversationMetadata>) -> Result<Self, MurmurError> {
        entries.sort_by(display_order);
        let encoded = codec::encode(&entries)?;
        Ok(Self { entries, encoded })
    }

    /// The store write that persists this collection.
    pub fn store_op(&self) -> StoreOp {
        StoreOp::put(keys::INDEX_KEY, self.encoded.clone())
    }

    pub fn entries(&self) -> &[ConversationMetadata] {
        &self.entries
    }
}

/// Exclusive access to the loaded index.
pub struct IndexGuard<'a> {
    entries: MutexGuard<'a, Option<Vec<ConversationMetadata>>>,
}

impl IndexGuard<'_> {
    pub fn entries(&self) -> &[ConversationMetadata] {
        self.entries.as_deref().unwrap_or_default()
    }

    pub fn get(&self, id: &str) -> Option<&ConversationMetadata> {
        self.entries().iter().find(|m| m.id == id)
    }

    /// Stages the collection with `metadata` replacing any entry of the same id.
    pub fn stage_upsert(&self, metadata: ConversationMetadata) -> Result<StagedIndex, MurmurError> {
        let mut entries: Vec<_> = self
            .entries()
            .iter()
            .filter(|m| m.id != metadata.id)
            .cloned()
            .collect();
        entries.push(metadata);
        StagedIndex::new(entries)
    }

    /// Stages several upserts at once.
    pub fn stage_upsert_many(
        &self,
        metadata: Vec<ConversationMetadata>,
    ) -> Result<StagedIndex, MurmurError> {
        let mut entries: Vec<_> = self
            .entries()
            .iter()
            .filter(|m| !metadata.iter().any(|n| n.id == m.id))
            .cloned()
            .collect();
        entries.extend(metadata);
        StagedIndex::new(entries)
    }

    /// Stages the collection without `id`.
    pub fn stage_remove(&self, id: &str) -> Result<StagedIndex, MurmurError> {
        StagedIndex::new(self.entries().iter().filter(|m| m.id != id).cloned().collect())
    }

    /// Installs a staged collection whose store write has succeeded.
    pub fn commit(&mut self, staged: StagedIndex) {
        *self.entries = Some(staged.entries);
    }
}

/// Persisted, ordered collection of [`ConversationMetadata`].
pub struct SecondaryIndex {
    store: Arc<dyn RecordStore>,
    preview_max_chars: usize,
    entries: Mutex<Option<Vec<ConversationMetadata>>>,
}

impl SecondaryIndex {
    pub fn new(store: Arc<dyn RecordStore>, preview_max_chars: usize) -> Self {
        Self {
            store,
            preview_max_chars,
            entries: Mutex::new(None),
        }
    }

    /// Projects a record into its index entry.
    pub fn project(&self, conversation: &Conversation) -> ConversationMetadata {
        conversation.project(self.preview_max_chars)
    }

    /// Locks the index, loading it from the store on first use.
    pub async fn lock(&self) -> Result<IndexGuard<'_>, MurmurError> {
        let mut entries = self.entries.lock().await;
        if entries.is_none() {
            *entries = Some(self.load().await?);
        }
        Ok(IndexGuard { entries })
    }

    /// Every entry in display order.
    pub async fn list_all(&self) -> Result<Vec<ConversationMetadata>, MurmurError> {
        Ok(self.lock().await?.entries().to_vec())
    }

    pub async fn get(&self, id: &str) -> Result<Option<ConversationMetadata>, MurmurError> {
        Ok(self.lock().await?.get(id).cloned())
    }

    /// Replaces the entry for `metadata.id` and persists the index alone.
    pub async fn upsert(&self, metadata: ConversationMetadata) -> Result<(), MurmurError> {
        let mut guard = self.lock().await?;
        let staged = guard.stage_upsert(metadata)?;
        self.store.apply(vec![staged.store_op()]).await?;
        guard.commit(staged);
        Ok(())
    }

    /// Drops the entry for `id`, returning whether one existed.
    pub async fn remove(&self, id: &str) -> Result<bool, MurmurError> {
        let mut guard = self.lock().await?;
        if guard.get(id).is_none() {
            return Ok(false);
        }
        let staged = guard.stage_remove(id)?;
        self.store.apply(vec![staged.store_op()]).await?;
        guard.commit(staged);
        Ok(true)
    }

    /// Recomputes the index from every stored record and persists it.
    ///
    /// Records that cannot be decoded are left out and logged.
    pub async fn rebuild(&self) -> Result<usize, MurmurError> {
        let mut guard = self.entries.lock().await;
        let staged = StagedIndex::new(self.project_records().await?)?;
        self.store.apply(vec![staged.store_op()]).await?;
        let count = staged.entries.len();
        *guard = Some(staged.entries);
        debug!(entries = count, "index rebuilt from records");
        Ok(count)
    }

    /// Forgets the in-memory copy so the next access reloads from the store.
    pub async fn invalidate(&self) {
        *self.entries.lock().await = None;
    }

    async fn load(&self) -> Result<Vec<ConversationMetadata>, MurmurError> {
        let Some(raw) = self.store.get(keys::INDEX_KEY).await? else {
            return Ok(Vec::new());
        };
        match codec::decode::<Vec<ConversationMetadata>>(&raw) {
            Ok(mut entries) => {
                entries.sort_by(display_order);
                Ok(entries)
            }
            Err(e) => {
                warn!(error = %e, "conversation index unreadable, rebuilding from records");
                let staged = StagedIndex::new(self.project_records().await?)?;
                self.store.apply(vec![staged.store_op()]).await?;
                Ok(staged.entries)
            }
        }
    }

    async fn project_records(&self) -> Result<Vec<ConversationMetadata>, MurmurError> {
        let mut entries = Vec::new();
        for key in self.store.list_keys(keys::CONVERSATION_PREFIX).await? {
            let Some(raw) = self.store.get(&key).await? else {
                continue;
            };
            match codec::decode::<Conversation>(&raw) {
                Ok(conversation) => entries.push(self.project(&conversation)),
                Err(e) => warn!(key = %key, error = %e, "skipping unreadable conversation record"),
            }
        }
        Ok(entries)
    }
}
