// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation repository: the single write path for records.
//!
//! Every write follows the same sequence: validate, persist the record and
//! the recomputed index entry in one atomic batch, commit the index, refresh
//! the cache. A failure at any step leaves store, index and cache exactly as
//! they were. Writes to one conversation are ordered by its
//! [`ConversationGuard`]; the index lock is always taken after it.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use murmur_config::MurmurConfig;
use murmur_core::{
    Conversation, ConversationMetadata, HealthStatus, MurmurError, RecordStore, StoreOp,
};
use murmur_storage::{codec, keys};

use crate::cache::{CacheStats, LruCache};
use crate::index::SecondaryIndex;
use crate::queue::{ConversationGuard, MutationQueue};

/// Tuning knobs for [`ConversationRepository`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepositoryOptions {
    pub cache_capacity: usize,
    pub preview_max_chars: usize,
}

impl Default for RepositoryOptions {
    fn default() -> Self {
        Self {
            cache_capacity: 50,
            preview_max_chars: 100,
        }
    }
}

impl From<&MurmurConfig> for RepositoryOptions {
    fn from(config: &MurmurConfig) -> Self {
        Self {
            cache_capacity: config.cache.capacity,
            preview_max_chars: config.conversation.preview_max_chars,
        }
    }
}

/// A disagreement between the index and the stored records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inconsistency {
    /// A record exists but the index has no entry for it.
    MissingFromIndex { id: String },
    /// The index lists an id that has no record.
    OrphanedEntry { id: String },
    /// The index entry does not match the record's projection.
    StaleEntry { id: String },
    /// The index lists the same id more than once.
    DuplicateEntry { id: String },
    /// The record's message count disagrees with its messages.
    MessageCountMismatch { id: String, stored: usize, actual: usize },
    /// The record could not be decoded.
    UnreadableRecord { id: String, message: String },
}

impl fmt::Display for Inconsistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Inconsistency::MissingFromIndex { id } => write!(f, "{id}: record has no index entry"),
            Inconsistency::OrphanedEntry { id } => write!(f, "{id}: index entry has no record"),
            Inconsistency::StaleEntry { id } => write!(f, "{id}: index entry is out of date"),
            Inconsistency::DuplicateEntry { id } => write!(f, "{id}: listed more than once"),
            Inconsistency::MessageCountMismatch { id, stored, actual } => {
                write!(f, "{id}: message_count is {stored} but {actual} messages are stored")
            }
            Inconsistency::UnreadableRecord { id, message } => {
                write!(f, "{id}: record unreadable ({message})")
            }
        }
    }
}

/// Result of a bulk insert.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkInsert {
    pub inserted: Vec<Conversation>,
    pub skipped: Vec<String>,
}

pub struct ConversationRepository {
    store: Arc<dyn RecordStore>,
    index: SecondaryIndex,
    cache: Mutex<LruCache<String, Conversation>>,
    queue: MutationQueue,
}

impl ConversationRepository {
    pub fn new(store: Arc<dyn RecordStore>, options: RepositoryOptions) -> Self {
        Self {
            index: SecondaryIndex::new(store.clone(), options.preview_max_chars),
            cache: Mutex::new(LruCache::new(options.cache_capacity)),
            queue: MutationQueue::new(),
            store,
        }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn index(&self) -> &SecondaryIndex {
        &self.index
    }

    /// Exclusive mutation rights for `id`.
    pub async fn lock(&self, id: &str) -> ConversationGuard {
        self.queue.lock(id).await
    }

    /// Loads a conversation, ordered after any in-flight mutation of it.
    pub async fn load(&self, id: &str) -> Result<Conversation, MurmurError> {
        let guard = self.lock(id).await;
        self.load_locked(&guard).await
    }

    /// Loads through the cache while the caller holds the guard.
    pub async fn load_locked(&self, guard: &ConversationGuard) -> Result<Conversation, MurmurError> {
        let id = guard.id();
        if let Some(conversation) = self.cache().get(&id.to_string()) {
            return Ok(conversation);
        }
        let conversation = self
            .read_record(id)
            .await?
            .ok_or_else(|| MurmurError::conversation_not_found(id))?;
        self.cache().put(id.to_string(), conversation.clone());
        Ok(conversation)
    }

    pub async fn exists(&self, id: &str) -> Result<bool, MurmurError> {
        if self.cache().contains(&id.to_string()) {
            return Ok(true);
        }
        Ok(self.store.get(&keys::conversation_key(id)).await?.is_some())
    }

    /// Persists a new conversation. Fails with `Validation` if the id is taken.
    pub async fn insert(&self, conversation: Conversation) -> Result<Conversation, MurmurError> {
        let guard = self.lock(&conversation.id).await;
        self.insert_locked(&guard, conversation).await
    }

    pub async fn insert_locked(
        &self,
        guard: &ConversationGuard,
        mut conversation: Conversation,
    ) -> Result<Conversation, MurmurError> {
        ensure_guard(guard, &conversation.id)?;
        if conversation.id.trim().is_empty() {
            return Err(MurmurError::Validation(
                "conversation id must not be empty".into(),
            ));
        }
        if self.exists(&conversation.id).await? {
            return Err(MurmurError::Validation(format!(
                "conversation {} already exists",
                conversation.id
            )));
        }
        normalize(&mut conversation, None);
        self.write(&conversation).await?;
        debug!(conversation_id = %conversation.id, "conversation inserted");
        Ok(conversation)
    }

    /// Guards for every distinct id in `ids`.
    ///
    /// Taken in sorted order so concurrent bulk writers cannot deadlock.
    pub async fn lock_many<'a, I>(&self, ids: I) -> Vec<ConversationGuard>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let ids: BTreeSet<&str> = ids.into_iter().collect();
        let mut guards = Vec::with_capacity(ids.len());
        for id in ids {
            guards.push(self.lock(id).await);
        }
        guards
    }

    /// Inserts every conversation whose id is not already stored, in one batch.
    ///
    /// Ids already present (or repeated within `conversations`) are skipped.
    pub async fn insert_many(
        &self,
        conversations: Vec<Conversation>,
    ) -> Result<BulkInsert, MurmurError> {
        let guards = self
            .lock_many(conversations.iter().map(|c| c.id.as_str()))
            .await;
        self.insert_many_locked(&guards, conversations).await
    }

    /// Like [`insert_many`](Self::insert_many) for a caller holding the
    /// guards of every id in `conversations`.
    pub async fn insert_many_locked(
        &self,
        guards: &[ConversationGuard],
        conversations: Vec<Conversation>,
    ) -> Result<BulkInsert, MurmurError> {
        let held: BTreeSet<&str> = guards.iter().map(ConversationGuard::id).collect();
        let mut result = BulkInsert::default();
        let mut seen = BTreeSet::new();
        for mut conversation in conversations {
            if conversation.id.trim().is_empty() {
                return Err(MurmurError::Validation(
                    "conversation id must not be empty".into(),
                ));
            }
            if !held.contains(conversation.id.as_str()) {
                return Err(MurmurError::Internal(format!(
                    "bulk insert of {} without its guard",
                    conversation.id
                )));
            }
            if !seen.insert(conversation.id.clone()) || self.exists(&conversation.id).await? {
                result.skipped.push(conversation.id);
                continue;
            }
            normalize(&mut conversation, None);
            result.inserted.push(conversation);
        }
        if result.inserted.is_empty() {
            return Ok(result);
        }

        let mut ops = Vec::with_capacity(result.inserted.len() + 1);
        for conversation in &result.inserted {
            ops.push(StoreOp::put(
                keys::conversation_key(&conversation.id),
                codec::encode(conversation)?,
            ));
        }
        let mut index = self.index.lock().await?;
        let staged = index.stage_upsert_many(
            result
                .inserted
                .iter()
                .map(|c| self.index.project(c))
                .collect(),
        )?;
        ops.push(staged.store_op());
        self.store.apply(ops).await?;
        index.commit(staged);
        drop(index);

        let mut cache = self.cache();
        for conversation in &result.inserted {
            cache.put(conversation.id.clone(), conversation.clone());
        }
        drop(cache);

        info!(
            inserted = result.inserted.len(),
            skipped = result.skipped.len(),
            "bulk insert complete"
        );
        Ok(result)
    }

    /// Applies `f` to a copy of the stored record and persists the result.
    pub async fn mutate<F>(&self, id: &str, f: F) -> Result<Conversation, MurmurError>
    where
        F: FnOnce(&mut Conversation) -> Result<(), MurmurError>,
    {
        let guard = self.lock(id).await;
        self.mutate_locked(&guard, f).await
    }

    /// Like [`mutate`](Self::mutate) for a caller that already holds the guard.
    ///
    /// If `f` fails nothing is written.
    pub async fn mutate_locked<F>(
        &self,
        guard: &ConversationGuard,
        f: F,
    ) -> Result<Conversation, MurmurError>
    where
        F: FnOnce(&mut Conversation) -> Result<(), MurmurError>,
    {
        let current = self.load_locked(guard).await?;
        let mut next = current.clone();
        f(&mut next)?;
        if next.id != current.id {
            return Err(MurmurError::Validation(
                "a conversation id cannot be changed".into(),
            ));
        }
        normalize(&mut next, Some(&current));
        if next == current {
            return Ok(next);
        }
        self.write(&next).await?;
        Ok(next)
    }

    /// Removes the record, its index entry and its draft together.
    pub async fn delete(&self, id: &str) -> Result<(), MurmurError> {
        let guard = self.lock(id).await;
        self.delete_locked(&guard).await
    }

    pub async fn delete_locked(&self, guard: &ConversationGuard) -> Result<(), MurmurError> {
        let id = guard.id();
        let has_record = self.store.get(&keys::conversation_key(id)).await?.is_some();
        let mut index = self.index.lock().await?;
        if !has_record && index.get(id).is_none() {
            return Err(MurmurError::conversation_not_found(id));
        }
        let staged = index.stage_remove(id)?;
        self.store
            .apply(vec![
                StoreOp::remove(keys::conversation_key(id)),
                staged.store_op(),
                StoreOp::remove(keys::draft_key(id)),
            ])
            .await?;
        index.commit(staged);
        drop(index);
        self.cache().remove(&id.to_string());
        debug!(conversation_id = %id, "conversation deleted");
        Ok(())
    }

    /// Index entries in display order.
    pub async fn list_all(&self) -> Result<Vec<ConversationMetadata>, MurmurError> {
        self.index.list_all().await
    }

    /// Every conversation in index order. Does not disturb the cache.
    pub async fn load_all(&self) -> Result<Vec<Conversation>, MurmurError> {
        let mut conversations = Vec::new();
        for entry in self.index.list_all().await? {
            let cached = self.cache().peek(&entry.id);
            let conversation = match cached {
                Some(conversation) => Some(conversation),
                None => self.read_record(&entry.id).await?,
            };
            match conversation {
                Some(conversation) => conversations.push(conversation),
                None => warn!(conversation_id = %entry.id, "index entry without record"),
            }
        }
        Ok(conversations)
    }

    /// Recomputes the index from the stored records.
    pub async fn rebuild_index(&self) -> Result<usize, MurmurError> {
        let count = self.index.rebuild().await?;
        info!(entries = count, "conversation index rebuilt");
        Ok(count)
    }

    /// Lists every disagreement between the index and the records.
    pub async fn verify_consistency(&self) -> Result<Vec<Inconsistency>, MurmurError> {
        let index = self.index.lock().await?;
        let mut problems = Vec::new();

        let mut entries: BTreeMap<&str, &ConversationMetadata> = BTreeMap::new();
        for entry in index.entries() {
            if entries.insert(entry.id.as_str(), entry).is_some() {
                problems.push(Inconsistency::DuplicateEntry {
                    id: entry.id.clone(),
                });
            }
        }

        let mut record_ids = BTreeSet::new();
        for key in self.store.list_keys(keys::CONVERSATION_PREFIX).await? {
            let Some(id) = keys::conversation_id_from_key(&key) else {
                continue;
            };
            record_ids.insert(id.to_string());
            let Some(raw) = self.store.get(&key).await? else {
                continue;
            };
            let conversation = match codec::decode::<Conversation>(&raw) {
                Ok(conversation) => conversation,
                Err(e) => {
                    problems.push(Inconsistency::UnreadableRecord {
                        id: id.to_string(),
                        message: e.to_string(),
                    });
                    continue;
                }
            };
            if conversation.message_count != conversation.messages.len() {
                problems.push(Inconsistency::MessageCountMismatch {
                    id: id.to_string(),
                    stored: conversation.message_count,
                    actual: conversation.messages.len(),
                });
            }
            match entries.get(id) {
                None => problems.push(Inconsistency::MissingFromIndex { id: id.to_string() }),
                Some(entry) if **entry != self.index.project(&conversation) => {
                    problems.push(Inconsistency::StaleEntry { id: id.to_string() })
                }
                Some(_) => {}
            }
        }

        for id in entries.keys() {
            if !record_ids.contains(*id) {
                problems.push(Inconsistency::OrphanedEntry { id: id.to_string() });
            }
        }
        Ok(problems)
    }

    /// The persisted active-conversation pointer.
    pub async fn active_id(&self) -> Result<Option<String>, MurmurError> {
        match self.store.get(keys::ACTIVE_CONVERSATION_KEY).await? {
            Some(raw) => Ok(Some(codec::decode(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn set_active_id(&self, id: Option<&str>) -> Result<(), MurmurError> {
        match id {
            Some(id) => {
                self.store
                    .put(keys::ACTIVE_CONVERSATION_KEY, &codec::encode(&id)?)
                    .await
            }
            None => self
                .store
                .remove(keys::ACTIVE_CONVERSATION_KEY)
                .await
                .map(|_| ()),
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache().stats()
    }

    pub async fn health_check(&self) -> Result<HealthStatus, MurmurError> {
        self.store.health_check().await
    }

    /// Drops cached state and closes the store.
    pub async fn close(&self) -> Result<(), MurmurError> {
        self.cache().clear();
        self.index.invalidate().await;
        self.store.close().await
    }

    async fn read_record(&self, id: &str) -> Result<Option<Conversation>, MurmurError> {
        match self.store.get(&keys::conversation_key(id)).await? {
            Some(raw) => Ok(Some(codec::decode(&raw)?)),
            None => Ok(None),
        }
    }

    async fn write(&self, conversation: &Conversation) -> Result<(), MurmurError> {
        let encoded = codec::encode(conversation)?;
        let mut index = self.index.lock().await?;
        let staged = index.stage_upsert(self.index.project(conversation))?;
        self.store
            .apply(vec![
                StoreOp::put(keys::conversation_key(&conversation.id), encoded),
                staged.store_op(),
            ])
            .await?;
        index.commit(staged);
        drop(index);
        self.cache()
            .put(conversation.id.clone(), conversation.clone());
        Ok(())
    }

    fn cache(&self) -> MutexGuard<'_, LruCache<String, Conversation>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn ensure_guard(guard: &ConversationGuard, id: &str) -> Result<(), MurmurError> {
    if guard.id() == id {
        Ok(())
    } else {
        Err(MurmurError::Internal(format!(
            "guard for {} used to write {id}",
            guard.id()
        )))
    }
}

/// Restores the record invariants before a write.
///
/// Typing placeholders are dropped, the message count is recomputed, and
/// against the previous version `created_at` is pinned while `updated_at`
/// and `tokens_used` may only grow.
pub(crate) fn normalize(conversation: &mut Conversation, previous: Option<&Conversation>) {
    conversation.messages.retain(|m| !m.is_typing);
    conversation.message_count = conversation.messages.len();
    if let Some(previous) = previous {
        conversation.created_at = previous.created_at;
        conversation.touch(previous.updated_at);
        conversation.tokens_used = conversation.tokens_used.max(previous.tokens_used);
    }
    let created_at = conversation.created_at;
    conversation.touch(created_at);
}
