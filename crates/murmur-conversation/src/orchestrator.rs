// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The stateful conversation facade consumed by presentation code.
//!
//! Holds an in-process mirror of the index and the active conversation.
//! Every mutation goes to storage first; the mirror changes only after the
//! durable write succeeds, while the conversation's mutation guard is still
//! held, so the mirror observes writes to one id in the order they landed.
//! Failures are returned to the caller and also published as
//! [`ConversationEvent::Failed`].

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info, warn};
use uuid::Uuid;

use murmur_config::MurmurConfig;
use murmur_config::model::ConversationConfig;
use murmur_core::{
    Conversation, ConversationMetadata, ConversationStats, Draft, HealthStatus, Message,
    MessagePatch, MurmurError, NewMessage, RecordStore, RemoteMirror, Role, Specialist, Timestamp,
    truncate_with_ellipsis,
};

use crate::cache::CacheStats;
use crate::drafts::DraftStore;
use crate::events::ConversationEvent;
use crate::index::display_order;
use crate::remote::RemoteSync;
use crate::repository::{ConversationRepository, RepositoryOptions};
use crate::search::{self, ListFilter};
use crate::transfer::{ExportBundle, ImportReport, normalize_import};

const EVENT_CAPACITY: usize = 256;

/// Which kinds of operation are currently in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperationFlags {
    pub creating: bool,
    pub deleting: bool,
    pub updating: bool,
}

#[derive(Default)]
struct FlagCounters {
    creating: AtomicUsize,
    deleting: AtomicUsize,
    updating: AtomicUsize,
}

/// Raises a counter for the lifetime of an operation.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn start(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct MirrorState {
    conversations: Vec<ConversationMetadata>,
    active: Option<Conversation>,
}

pub struct ConversationOrchestrator {
    repo: ConversationRepository,
    drafts: DraftStore,
    remote: RemoteSync,
    settings: ConversationConfig,
    state: RwLock<MirrorState>,
    flags: FlagCounters,
    events: broadcast::Sender<ConversationEvent>,
}

impl ConversationOrchestrator {
    /// Builds an orchestrator over an already initialized store.
    ///
    /// The mirror starts empty; call [`restore`](Self::restore) to load it.
    pub fn new(
        store: Arc<dyn RecordStore>,
        remote: Arc<dyn RemoteMirror>,
        config: &MurmurConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            repo: ConversationRepository::new(store.clone(), RepositoryOptions::from(config)),
            drafts: DraftStore::new(store),
            remote: RemoteSync::new(remote, &config.remote),
            settings: config.conversation.clone(),
            state: RwLock::new(MirrorState::default()),
            flags: FlagCounters::default(),
            events,
        }
    }

    /// Initializes `store`, builds the orchestrator and restores its mirror.
    pub async fn open(
        store: Arc<dyn RecordStore>,
        remote: Arc<dyn RemoteMirror>,
        config: &MurmurConfig,
    ) -> Result<Self, MurmurError> {
        store.initialize().await?;
        let orchestrator = Self::new(store, remote, config);
        orchestrator.restore().await?;
        Ok(orchestrator)
    }

    pub fn repository(&self) -> &ConversationRepository {
        &self.repo
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConversationEvent> {
        self.events.subscribe()
    }

    // --- Mirror snapshots ---

    /// Index entries as currently mirrored, newest activity first.
    pub async fn conversations(&self) -> Vec<ConversationMetadata> {
        self.state.read().await.conversations.clone()
    }

    pub async fn active(&self) -> Option<Conversation> {
        self.state.read().await.active.clone()
    }

    pub fn flags(&self) -> OperationFlags {
        OperationFlags {
            creating: self.flags.creating.load(Ordering::SeqCst) > 0,
            deleting: self.flags.deleting.load(Ordering::SeqCst) > 0,
            updating: self.flags.updating.load(Ordering::SeqCst) > 0,
        }
    }

    /// Mirrored entries matching `filter`.
    pub async fn list(&self, filter: &ListFilter) -> Vec<ConversationMetadata> {
        self.state
            .read()
            .await
            .conversations
            .iter()
            .filter(|entry| filter.matches(entry))
            .cloned()
            .collect()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.repo.cache_stats()
    }

    pub async fn health_check(&self) -> Result<HealthStatus, MurmurError> {
        self.repo.health_check().await
    }

    // --- Lifecycle ---

    /// Reloads the mirror from the index and the persisted active pointer.
    pub async fn restore(&self) -> Result<(), MurmurError> {
        let result = self.restore_inner().await;
        self.report("restore", result)
    }

    async fn restore_inner(&self) -> Result<(), MurmurError> {
        let conversations = self.repo.list_all().await?;
        let active_id = match self.repo.active_id().await {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "active conversation pointer unreadable, ignoring");
                None
            }
        };
        let active = match active_id {
            Some(id) => match self.repo.load(&id).await {
                Ok(conversation) => Some(conversation),
                Err(e) if e.is_not_found() => {
                    self.persist_active(None).await;
                    None
                }
                Err(e) => return Err(e),
            },
            None => None,
        };
        let active_id = active.as_ref().map(|c| c.id.clone());
        {
            let mut state = self.state.write().await;
            state.conversations = conversations;
            state.active = active;
        }
        info!(active = ?active_id, "conversation mirror restored");
        if active_id.is_some() {
            self.emit(ConversationEvent::ActiveChanged { id: active_id });
        }
        Ok(())
    }

    /// Re-reads the index and the active record, discarding the mirror.
    pub async fn refresh(&self) -> Result<(), MurmurError> {
        let result = self.refresh_inner().await;
        self.report("refresh", result)
    }

    async fn refresh_inner(&self) -> Result<(), MurmurError> {
        let conversations = self.repo.list_all().await?;
        let active_id = self.state.read().await.active.as_ref().map(|c| c.id.clone());
        let active = match active_id {
            Some(id) => match self.repo.load(&id).await {
                Ok(conversation) => Some(conversation),
                Err(e) if e.is_not_found() => None,
                Err(e) => return Err(e),
            },
            None => None,
        };
        let mut state = self.state.write().await;
        state.conversations = conversations;
        state.active = active;
        Ok(())
    }

    /// Delivers pending remote calls, then drops cached state and closes the store.
    pub async fn close(&self) -> Result<(), MurmurError> {
        self.remote.flush().await;
        self.repo.close().await
    }

    /// Waits for every remote mirror call queued so far.
    pub async fn flush_remote(&self) {
        self.remote.flush().await;
    }

    // --- Conversations ---

    /// Creates an empty conversation and makes it active.
    ///
    /// A missing or blank `title` falls back to the configured default.
    pub async fn create_conversation(
        &self,
        specialist: Option<Specialist>,
        title: Option<String>,
    ) -> Result<Conversation, MurmurError> {
        let result = self.create_inner(specialist, title).await;
        self.report("create_conversation", result)
    }

    async fn create_inner(
        &self,
        specialist: Option<Specialist>,
        title: Option<String>,
    ) -> Result<Conversation, MurmurError> {
        let _creating = InFlight::start(&self.flags.creating);
        let title = title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| self.settings.default_title.clone());
        let conversation = Conversation::new(
            Uuid::new_v4().to_string(),
            title,
            specialist,
            Timestamp::now(),
        );
        let guard = self.repo.lock(&conversation.id).await;
        let conversation = self.repo.insert_locked(&guard, conversation).await?;
        self.persist_active(Some(&conversation.id)).await;
        {
            let mut state = self.state.write().await;
            upsert_entry(
                &mut state.conversations,
                conversation.project(self.settings.preview_max_chars),
            );
            state.active = Some(conversation.clone());
        }
        drop(guard);
        info!(conversation_id = %conversation.id, "conversation created");
        self.emit(ConversationEvent::Created {
            id: conversation.id.clone(),
        });
        self.emit(ConversationEvent::ActiveChanged {
            id: Some(conversation.id.clone()),
        });
        self.remote.created(&conversation);
        Ok(conversation)
    }

    /// Loads a conversation and makes it active.
    pub async fn load_conversation(&self, id: &str) -> Result<Conversation, MurmurError> {
        let result = self.load_inner(id).await;
        self.report("load_conversation", result)
    }

    async fn load_inner(&self, id: &str) -> Result<Conversation, MurmurError> {
        let guard = self.repo.lock(id).await;
        let conversation = self.repo.load_locked(&guard).await?;
        {
            let mut state = self.state.write().await;
            upsert_entry(
                &mut state.conversations,
                conversation.project(self.settings.preview_max_chars),
            );
            state.active = Some(conversation.clone());
        }
        self.persist_active(Some(id)).await;
        drop(guard);
        self.emit(ConversationEvent::ActiveChanged {
            id: Some(id.to_string()),
        });
        Ok(conversation)
    }

    /// Deletes a conversation together with its index entry and draft.
    pub async fn delete_conversation(&self, id: &str) -> Result<(), MurmurError> {
        let result = self.delete_inner(id).await;
        self.report("delete_conversation", result)
    }

    async fn delete_inner(&self, id: &str) -> Result<(), MurmurError> {
        let _deleting = InFlight::start(&self.flags.deleting);
        let guard = self.repo.lock(id).await;
        self.repo.delete_locked(&guard).await?;
        let was_active = {
            let mut state = self.state.write().await;
            state.conversations.retain(|entry| entry.id != id);
            let was_active = state.active.as_ref().is_some_and(|c| c.id == id);
            if was_active {
                state.active = None;
            }
            was_active
        };
        if was_active {
            self.persist_active(None).await;
        }
        drop(guard);
        if was_active {
            self.emit(ConversationEvent::ActiveChanged { id: None });
        }
        info!(conversation_id = %id, "conversation deleted");
        self.emit(ConversationEvent::Deleted { id: id.to_string() });
        self.remote.deleted(id);
        Ok(())
    }

    /// Forgets the active conversation without touching storage records.
    pub async fn clear_active(&self) {
        let had_active = self.state.write().await.active.take().is_some();
        if had_active {
            self.persist_active(None).await;
            self.emit(ConversationEvent::ActiveChanged { id: None });
        }
    }

    // --- Messages ---

    /// Appends a message. When a user message is the first message of the
    /// conversation, its truncated text becomes the title.
    pub async fn add_message(&self, id: &str, message: NewMessage) -> Result<Message, MurmurError> {
        let result = self.add_message_inner(id, message).await;
        self.report("add_message", result)
    }

    async fn add_message_inner(&self, id: &str, new: NewMessage) -> Result<Message, MurmurError> {
        if new.content.trim().is_empty() && new.attachments.is_empty() {
            return Err(MurmurError::Validation(
                "a message needs text or at least one attachment".into(),
            ));
        }
        let title_max_chars = self.settings.title_max_chars;
        let (_, message) = self
            .update_conversation(id, move |c| {
                let now = Timestamp::now();
                let message = Message {
                    id: Uuid::new_v4().to_string(),
                    role: new.role,
                    content: new.content,
                    timestamp: now,
                    attachments: new.attachments,
                    metadata: new.metadata,
                    is_typing: false,
                };
                if c.messages.is_empty() && message.role == Role::User {
                    let title = truncate_with_ellipsis(&message.content, title_max_chars);
                    if !title.is_empty() {
                        c.title = title;
                    }
                }
                c.tokens_used += message.tokens();
                c.messages.push(message.clone());
                c.touch(now);
                Ok(message)
            })
            .await?;
        debug!(conversation_id = %id, message_id = %message.id, role = %message.role, "message added");
        Ok(message)
    }

    /// Applies `patch` to one message. The message timestamp never changes.
    pub async fn update_message(
        &self,
        id: &str,
        message_id: &str,
        patch: MessagePatch,
    ) -> Result<Message, MurmurError> {
        let result = self.update_message_inner(id, message_id, patch).await;
        self.report("update_message", result)
    }

    async fn update_message_inner(
        &self,
        id: &str,
        message_id: &str,
        patch: MessagePatch,
    ) -> Result<Message, MurmurError> {
        if patch == MessagePatch::default() {
            return Err(MurmurError::Validation("message patch is empty".into()));
        }
        let message_id = message_id.to_string();
        let (_, message) = self
            .update_conversation(id, move |c| {
                let index = c
                    .message_index(&message_id)
                    .ok_or_else(|| MurmurError::message_not_found(message_id.as_str()))?;
                let message = &mut c.messages[index];
                let previous_tokens = message.tokens();
                if let Some(content) = patch.content {
                    message.content = content;
                }
                if let Some(attachments) = patch.attachments {
                    message.attachments = attachments;
                }
                if let Some(metadata) = patch.metadata {
                    message.metadata = Some(metadata);
                }
                if message.content.trim().is_empty() && message.attachments.is_empty() {
                    return Err(MurmurError::Validation(
                        "a message needs text or at least one attachment".into(),
                    ));
                }
                let added = message.tokens().saturating_sub(previous_tokens);
                let updated = message.clone();
                c.tokens_used += added;
                c.touch(Timestamp::now());
                Ok(updated)
            })
            .await?;
        Ok(message)
    }

    /// Removes one message. Token totals are not reduced.
    pub async fn delete_message(&self, id: &str, message_id: &str) -> Result<(), MurmurError> {
        let result = self.delete_message_inner(id, message_id).await;
        self.report("delete_message", result)
    }

    async fn delete_message_inner(&self, id: &str, message_id: &str) -> Result<(), MurmurError> {
        let message_id = message_id.to_string();
        self.update_conversation(id, move |c| {
            let index = c
                .message_index(&message_id)
                .ok_or_else(|| MurmurError::message_not_found(message_id.as_str()))?;
            c.messages.remove(index);
            c.touch(Timestamp::now());
            Ok(())
        })
        .await?;
        Ok(())
    }

    /// Shows a typing placeholder on the active conversation.
    ///
    /// The placeholder exists only in the mirror and is never persisted.
    pub async fn begin_typing(&self, id: &str) -> Result<(), MurmurError> {
        let result = self.begin_typing_inner(id).await;
        self.report("begin_typing", result)
    }

    async fn begin_typing_inner(&self, id: &str) -> Result<(), MurmurError> {
        let mut state = self.state.write().await;
        let active = state
            .active
            .as_mut()
            .filter(|c| c.id == id)
            .ok_or_else(|| {
                MurmurError::Validation(format!("conversation {id} is not the active conversation"))
            })?;
        if !active.messages.iter().any(|m| m.is_typing) {
            active.messages.push(Message {
                id: format!("typing-{}", Uuid::new_v4()),
                role: Role::Assistant,
                content: String::new(),
                timestamp: Timestamp::now(),
                attachments: Vec::new(),
                metadata: None,
                is_typing: true,
            });
        }
        Ok(())
    }

    /// Removes the typing placeholder. Returns whether one was showing.
    pub async fn end_typing(&self, id: &str) -> bool {
        let mut state = self.state.write().await;
        match state.active.as_mut().filter(|c| c.id == id) {
            Some(active) => {
                let before = active.messages.len();
                active.messages.retain(|m| !m.is_typing);
                active.messages.len() != before
            }
            None => false,
        }
    }

    // --- Metadata ---

    pub async fn update_title(&self, id: &str, title: &str) -> Result<Conversation, MurmurError> {
        let result = self.update_title_inner(id, title).await;
        self.report("update_title", result)
    }

    async fn update_title_inner(&self, id: &str, title: &str) -> Result<Conversation, MurmurError> {
        let title = title.trim().to_string();
        if title.is_empty() {
            return Err(MurmurError::Validation("title must not be empty".into()));
        }
        let (conversation, ()) = self
            .update_conversation(id, move |c| {
                c.title = title;
                Ok(())
            })
            .await?;
        Ok(conversation)
    }

    /// Flips the favorite flag and returns the new value.
    pub async fn toggle_favorite(&self, id: &str) -> Result<bool, MurmurError> {
        let result = self
            .update_conversation(id, |c| {
                c.is_favorite = !c.is_favorite;
                Ok(c.is_favorite)
            })
            .await
            .map(|(_, value)| value);
        self.report("toggle_favorite", result)
    }

    /// Flips the archived flag and returns the new value.
    pub async fn toggle_archive(&self, id: &str) -> Result<bool, MurmurError> {
        let result = self
            .update_conversation(id, |c| {
                c.is_archived = !c.is_archived;
                Ok(c.is_archived)
            })
            .await
            .map(|(_, value)| value);
        self.report("toggle_archive", result)
    }

    /// Adds a tag. Returns `false` if it was already present.
    pub async fn add_tag(&self, id: &str, tag: &str) -> Result<bool, MurmurError> {
        let result = match normalize_tag(tag) {
            Ok(tag) => self
                .update_conversation(id, move |c| Ok(c.tags.insert(tag)))
                .await
                .map(|(_, added)| added),
            Err(e) => Err(e),
        };
        self.report("add_tag", result)
    }

    /// Removes a tag. Returns `false` if it was not present.
    pub async fn remove_tag(&self, id: &str, tag: &str) -> Result<bool, MurmurError> {
        let result = match normalize_tag(tag) {
            Ok(tag) => self
                .update_conversation(id, move |c| Ok(c.tags.remove(&tag)))
                .await
                .map(|(_, removed)| removed),
            Err(e) => Err(e),
        };
        self.report("remove_tag", result)
    }

    // --- Search, stats, transfer ---

    /// Conversations whose title, messages or tags contain `query`, in index order.
    pub async fn search(&self, query: &str) -> Result<Vec<ConversationMetadata>, MurmurError> {
        let result = self.search_inner(query).await;
        self.report("search", result)
    }

    async fn search_inner(&self, query: &str) -> Result<Vec<ConversationMetadata>, MurmurError> {
        let conversations = self.repo.load_all().await?;
        Ok(search::search(&conversations, query)?
            .into_iter()
            .map(|c| c.project(self.settings.preview_max_chars))
            .collect())
    }

    pub async fn stats(&self) -> Result<ConversationStats, MurmurError> {
        let result = self
            .repo
            .load_all()
            .await
            .map(|conversations| search::compute_stats(&conversations));
        self.report("stats", result)
    }

    /// Serializes every conversation into an export bundle.
    pub async fn export_all(&self) -> Result<String, MurmurError> {
        let result = match self.repo.load_all().await {
            Ok(conversations) => {
                let count = conversations.len();
                ExportBundle::new(conversations, Timestamp::now())
                    .encode()
                    .inspect(|_| info!(conversations = count, "export complete"))
            }
            Err(e) => Err(e),
        };
        self.report("export_all", result)
    }

    /// Adds every conversation from `blob` whose id is not stored yet.
    ///
    /// The whole bundle is validated before anything is written.
    pub async fn import_all(&self, blob: &str) -> Result<ImportReport, MurmurError> {
        let result = self.import_inner(blob).await;
        self.report("import_all", result)
    }

    async fn import_inner(&self, blob: &str) -> Result<ImportReport, MurmurError> {
        let _creating = InFlight::start(&self.flags.creating);
        let bundle = ExportBundle::decode(blob)?;
        let conversations = bundle
            .conversations
            .into_iter()
            .map(|c| normalize_import(c, &self.settings.default_title))
            .collect::<Result<Vec<_>, _>>()?;
        let guards = self
            .repo
            .lock_many(conversations.iter().map(|c| c.id.as_str()))
            .await;
        let outcome = self.repo.insert_many_locked(&guards, conversations).await?;
        {
            let mut state = self.state.write().await;
            for conversation in &outcome.inserted {
                upsert_entry(
                    &mut state.conversations,
                    conversation.project(self.settings.preview_max_chars),
                );
            }
        }
        drop(guards);
        for conversation in &outcome.inserted {
            self.emit(ConversationEvent::Created {
                id: conversation.id.clone(),
            });
            self.remote.created(conversation);
        }
        Ok(ImportReport {
            imported: outcome.inserted.len(),
            skipped: outcome.skipped.len(),
        })
    }

    // --- Drafts ---

    /// Saves draft text for an existing conversation, exactly as given.
    pub async fn save_draft(&self, id: &str, text: &str) -> Result<Draft, MurmurError> {
        let result = self.save_draft_inner(id, text).await;
        self.report("save_draft", result)
    }

    async fn save_draft_inner(&self, id: &str, text: &str) -> Result<Draft, MurmurError> {
        // Held so a concurrent delete cannot strand the draft.
        let _guard = self.repo.lock(id).await;
        if !self.repo.exists(id).await? {
            return Err(MurmurError::conversation_not_found(id));
        }
        self.drafts.save(id, text).await
    }

    /// Draft text for `id`, or an empty string.
    pub async fn get_draft(&self, id: &str) -> Result<String, MurmurError> {
        let result = self.drafts.text(id).await;
        self.report("get_draft", result)
    }

    pub async fn clear_draft(&self, id: &str) -> Result<bool, MurmurError> {
        let result = self.drafts.clear(id).await;
        self.report("clear_draft", result)
    }

    // --- Internals ---

    /// Read-modify-write of one conversation, then mirror, event and remote.
    async fn update_conversation<F, T>(
        &self,
        id: &str,
        f: F,
    ) -> Result<(Conversation, T), MurmurError>
    where
        F: FnOnce(&mut Conversation) -> Result<T, MurmurError>,
    {
        let _updating = InFlight::start(&self.flags.updating);
        let guard = self.repo.lock(id).await;
        let mut output = None;
        let conversation = self
            .repo
            .mutate_locked(&guard, |c| {
                output = Some(f(c)?);
                Ok(())
            })
            .await?;
        self.apply_to_mirror(&conversation).await;
        drop(guard);

        self.emit(ConversationEvent::Updated {
            id: conversation.id.clone(),
        });
        self.remote.updated(&conversation);
        let output =
            output.ok_or_else(|| MurmurError::Internal("mutation produced no result".into()))?;
        Ok((conversation, output))
    }

    async fn apply_to_mirror(&self, conversation: &Conversation) {
        let mut state = self.state.write().await;
        upsert_entry(
            &mut state.conversations,
            conversation.project(self.settings.preview_max_chars),
        );
        if let Some(active) = state.active.as_mut()
            && active.id == conversation.id
        {
            let typing: Vec<Message> = active
                .messages
                .iter()
                .filter(|m| m.is_typing)
                .cloned()
                .collect();
            *active = conversation.clone();
            active.messages.extend(typing);
        }
    }

    /// Writes the active pointer. It only seeds the next restore, so a
    /// failure is logged rather than failing the operation.
    async fn persist_active(&self, id: Option<&str>) {
        if let Err(e) = self.repo.set_active_id(id).await {
            warn!(error = %e, "failed to persist active conversation pointer");
        }
    }

    fn emit(&self, event: ConversationEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn report<T>(
        &self,
        operation: &'static str,
        result: Result<T, MurmurError>,
    ) -> Result<T, MurmurError> {
        if let Err(e) = &result {
            warn!(operation, error = %e, "conversation operation failed");
            self.emit(ConversationEvent::Failed {
                operation,
                message: e.to_string(),
            });
        }
        result
    }
}

fn upsert_entry(entries: &mut Vec<ConversationMetadata>, entry: ConversationMetadata) {
    entries.retain(|e| e.id != entry.id);
    entries.push(entry);
    entries.sort_by(display_order);
}

fn normalize_tag(tag: &str) -> Result<String, MurmurError> {
    let tag = tag.trim();
    if tag.is_empty() {
        Err(MurmurError::Validation("tag must not be empty".into()))
    } else {
        Ok(tag.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_core::GenerationMetadata;
    use murmur_storage::MemoryStore;

    use crate::remote::NoopMirror;

    fn config() -> MurmurConfig {
        let mut config = MurmurConfig::default();
        config.conversation.title_max_chars = 10;
        config
    }

    fn orchestrator_over(store: Arc<dyn RecordStore>) -> ConversationOrchestrator {
        ConversationOrchestrator::new(store, Arc::new(NoopMirror), &config())
    }

    fn orchestrator() -> ConversationOrchestrator {
        orchestrator_over(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn create_makes_conversation_active_and_listed() {
        let orch = orchestrator();
        let conv = orch.create_conversation(None, None).await.unwrap();
        assert_eq!(conv.title, "New Conversation");
        assert_eq!(orch.active().await.unwrap().id, conv.id);
        assert_eq!(orch.conversations().await.len(), 1);
        assert_eq!(
            orch.repository().active_id().await.unwrap().as_deref(),
            Some(conv.id.as_str())
        );
    }

    #[tokio::test]
    async fn first_user_message_sets_title_once() {
        let orch = orchestrator();
        let conv = orch.create_conversation(None, None).await.unwrap();
        orch.add_message(&conv.id, NewMessage::user("Hello there, how are you today?"))
            .await
            .unwrap();
        let active = orch.active().await.unwrap();
        assert_eq!(active.title, "Hello ther...");

        orch.add_message(&conv.id, NewMessage::user("Another topic entirely"))
            .await
            .unwrap();
        assert_eq!(orch.active().await.unwrap().title, "Hello ther...");
    }

    #[tokio::test]
    async fn assistant_first_conversation_is_not_retitled() {
        let orch = orchestrator();
        let conv = orch.create_conversation(None, None).await.unwrap();
        orch.add_message(&conv.id, NewMessage::assistant("Welcome!"))
            .await
            .unwrap();
        orch.add_message(&conv.id, NewMessage::user("Hi"))
            .await
            .unwrap();
        assert_eq!(orch.active().await.unwrap().title, "New Conversation");
    }

    #[tokio::test]
    async fn first_user_message_retitles_a_custom_title() {
        let orch = orchestrator();
        let named = orch
            .create_conversation(Some(Specialist::Coding), Some("Untitled chat".into()))
            .await
            .unwrap();
        orch.add_message(&named.id, NewMessage::user("Hello"))
            .await
            .unwrap();
        assert_eq!(orch.repository().load(&named.id).await.unwrap().title, "Hello");
        assert_eq!(orch.conversations().await[0].title, "Hello");
    }

    #[tokio::test]
    async fn mutating_inactive_conversation_does_not_activate_it() {
        let orch = orchestrator();
        let first = orch.create_conversation(None, None).await.unwrap();
        let second = orch.create_conversation(None, None).await.unwrap();
        orch.add_message(&first.id, NewMessage::user("ping"))
            .await
            .unwrap();
        assert_eq!(orch.active().await.unwrap().id, second.id);
        let listed = orch.conversations().await;
        assert_eq!(listed[0].id, first.id, "most recent activity first");
        assert_eq!(listed[0].message_count, 1);
    }

    #[tokio::test]
    async fn message_count_tracks_adds_and_deletes_and_tokens_only_grow() {
        let orch = orchestrator();
        let conv = orch.create_conversation(None, None).await.unwrap();
        let m1 = orch
            .add_message(
                &conv.id,
                NewMessage::assistant("answer").with_metadata(GenerationMetadata {
                    model: Some("m".into()),
                    tokens_used: 30,
                }),
            )
            .await
            .unwrap();
        orch.add_message(&conv.id, NewMessage::user("q")).await.unwrap();
        orch.update_message(
            &conv.id,
            &m1.id,
            MessagePatch {
                metadata: Some(GenerationMetadata {
                    model: Some("m".into()),
                    tokens_used: 45,
                }),
                ..MessagePatch::default()
            },
        )
        .await
        .unwrap();
        orch.delete_message(&conv.id, &m1.id).await.unwrap();

        let stored = orch.repository().load(&conv.id).await.unwrap();
        assert_eq!(stored.message_count, 1);
        assert_eq!(stored.messages.len(), 1);
        assert_eq!(stored.tokens_used, 45);
    }

    #[tokio::test]
    async fn update_message_keeps_timestamp_and_rejects_unknown_ids() {
        let orch = orchestrator();
        let conv = orch.create_conversation(None, None).await.unwrap();
        let msg = orch.add_message(&conv.id, NewMessage::user("draft one")).await.unwrap();
        let edited = orch
            .update_message(
                &conv.id,
                &msg.id,
                MessagePatch {
                    content: Some("draft two".into()),
                    ..MessagePatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(edited.content, "draft two");
        assert_eq!(edited.timestamp, msg.timestamp);

        let err = orch.delete_message(&conv.id, "nope").await.unwrap_err();
        assert!(err.is_not_found());
        let err = orch
            .update_message(&conv.id, &msg.id, MessagePatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MurmurError::Validation(_)));
    }

    #[tokio::test]
    async fn empty_messages_are_rejected() {
        let orch = orchestrator();
        let conv = orch.create_conversation(None, None).await.unwrap();
        let err = orch.add_message(&conv.id, NewMessage::user("   ")).await.unwrap_err();
        assert!(matches!(err, MurmurError::Validation(_)));
    }

    #[tokio::test]
    async fn toggles_tags_and_title() {
        let orch = orchestrator();
        let conv = orch.create_conversation(None, None).await.unwrap();
        assert!(orch.toggle_favorite(&conv.id).await.unwrap());
        assert!(!orch.toggle_favorite(&conv.id).await.unwrap());
        assert!(orch.toggle_archive(&conv.id).await.unwrap());
        assert!(orch.add_tag(&conv.id, " work ").await.unwrap());
        assert!(!orch.add_tag(&conv.id, "work").await.unwrap());
        assert!(orch.remove_tag(&conv.id, "work").await.unwrap());
        assert!(orch.add_tag(&conv.id, "").await.is_err());
        orch.update_title(&conv.id, "  Renamed ").await.unwrap();

        let archived = orch.list(&ListFilter::archived()).await;
        assert_eq!(archived.len(), 1);
        assert_eq!(archived[0].title, "Renamed");
        assert!(orch.update_title(&conv.id, " ").await.is_err());
    }

    #[tokio::test]
    async fn typing_placeholder_lives_only_in_the_mirror() {
        let orch = orchestrator();
        let conv = orch.create_conversation(None, None).await.unwrap();
        orch.begin_typing(&conv.id).await.unwrap();
        orch.add_message(&conv.id, NewMessage::user("hi")).await.unwrap();

        let active = orch.active().await.unwrap();
        assert_eq!(active.messages.len(), 2);
        assert!(active.messages.last().unwrap().is_typing);
        assert_eq!(active.message_count, 1);

        let stored = orch.repository().load(&conv.id).await.unwrap();
        assert_eq!(stored.messages.len(), 1);

        assert!(orch.end_typing(&conv.id).await);
        assert!(!orch.end_typing(&conv.id).await);
        assert_eq!(orch.active().await.unwrap().messages.len(), 1);
    }

    #[tokio::test]
    async fn typing_requires_active_conversation() {
        let orch = orchestrator();
        let conv = orch.create_conversation(None, None).await.unwrap();
        orch.clear_active().await;
        assert!(orch.begin_typing(&conv.id).await.is_err());
    }

    #[tokio::test]
    async fn delete_of_active_clears_it_and_its_draft() {
        let orch = orchestrator();
        let conv = orch.create_conversation(None, None).await.unwrap();
        orch.save_draft(&conv.id, "unsent").await.unwrap();
        assert_eq!(orch.get_draft(&conv.id).await.unwrap(), "unsent");

        orch.delete_conversation(&conv.id).await.unwrap();
        assert!(orch.active().await.is_none());
        assert!(orch.conversations().await.is_empty());
        assert_eq!(orch.get_draft(&conv.id).await.unwrap(), "");
        assert_eq!(orch.repository().active_id().await.unwrap(), None);
    }

    #[tokio::test]
    async fn drafts_need_an_existing_conversation() {
        let orch = orchestrator();
        let err = orch.save_draft("ghost", "text").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn draft_changes_leave_messages_alone() {
        let orch = orchestrator();
        let a = orch.create_conversation(None, None).await.unwrap();
        let b = orch.create_conversation(None, None).await.unwrap();
        orch.add_message(&a.id, NewMessage::user("keep me")).await.unwrap();
        orch.save_draft(&a.id, "draft a").await.unwrap();
        assert_eq!(orch.get_draft(&b.id).await.unwrap(), "");
        assert!(orch.clear_draft(&a.id).await.unwrap());
        assert_eq!(orch.repository().load(&a.id).await.unwrap().message_count, 1);
    }

    #[tokio::test]
    async fn search_and_stats_cover_all_conversations() {
        let orch = orchestrator();
        let a = orch.create_conversation(None, Some("Lisbon trip".into())).await.unwrap();
        let b = orch.create_conversation(None, None).await.unwrap();
        orch.add_message(&b.id, NewMessage::user("pack for LISBON")).await.unwrap();
        let c = orch.create_conversation(None, None).await.unwrap();
        orch.add_tag(&c.id, "lisbon-2026").await.unwrap();
        orch.create_conversation(None, None).await.unwrap();

        let mut found: Vec<_> = orch
            .search("lisbon")
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        found.sort();
        let mut expected = vec![a.id, b.id, c.id];
        expected.sort();
        assert_eq!(found, expected);

        let stats = orch.stats().await.unwrap();
        assert_eq!(stats.total_conversations, 4);
        assert_eq!(stats.total_messages, 1);
        assert!(orch.search("").await.is_err());
    }

    #[tokio::test]
    async fn import_of_export_is_idempotent() {
        let source = orchestrator();
        let conv = source.create_conversation(None, None).await.unwrap();
        source.add_message(&conv.id, NewMessage::user("hello")).await.unwrap();
        source.create_conversation(None, None).await.unwrap();
        let blob = source.export_all().await.unwrap();

        let target = orchestrator();
        let first = target.import_all(&blob).await.unwrap();
        assert_eq!(first, ImportReport { imported: 2, skipped: 0 });
        let second = target.import_all(&blob).await.unwrap();
        assert_eq!(second, ImportReport { imported: 0, skipped: 2 });

        assert_eq!(target.conversations().await.len(), 2);
        assert_eq!(
            target.repository().load(&conv.id).await.unwrap(),
            source.repository().load(&conv.id).await.unwrap()
        );
        assert!(target.repository().verify_consistency().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn restore_reloads_mirror_and_active_pointer() {
        let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new());
        let first = orchestrator_over(store.clone());
        let conv = first.create_conversation(None, None).await.unwrap();
        first.add_message(&conv.id, NewMessage::user("persisted")).await.unwrap();

        let second = orchestrator_over(store);
        second.restore().await.unwrap();
        assert_eq!(second.conversations().await.len(), 1);
        assert_eq!(second.active().await.unwrap().messages[0].content, "persisted");
    }

    #[tokio::test]
    async fn events_are_published_in_order() {
        let orch = orchestrator();
        let mut events = orch.subscribe();
        let conv = orch.create_conversation(None, None).await.unwrap();
        orch.toggle_favorite(&conv.id).await.unwrap();
        orch.delete_conversation(&conv.id).await.unwrap();

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        assert_eq!(
            seen,
            vec![
                ConversationEvent::Created { id: conv.id.clone() },
                ConversationEvent::ActiveChanged { id: Some(conv.id.clone()) },
                ConversationEvent::Updated { id: conv.id.clone() },
                ConversationEvent::ActiveChanged { id: None },
                ConversationEvent::Deleted { id: conv.id.clone() },
            ]
        );
    }

    #[tokio::test]
    async fn concurrent_adds_keep_mirror_consistent() {
        let orch = Arc::new(orchestrator());
        let conv = orch.create_conversation(None, None).await.unwrap();
        let mut handles = Vec::new();
        for i in 0..10 {
            let orch = orch.clone();
            let id = conv.id.clone();
            handles.push(tokio::spawn(async move {
                orch.add_message(&id, NewMessage::user(format!("message {i}")))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        let active = orch.active().await.unwrap();
        let stored = orch.repository().load(&conv.id).await.unwrap();
        assert_eq!(active, stored);
        assert_eq!(stored.message_count, 10);
        assert_eq!(orch.conversations().await[0].message_count, 10);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn load_racing_delete_never_leaves_a_dangling_pointer() {
        let orch = Arc::new(orchestrator());
        for _ in 0..25 {
            let conv = orch.create_conversation(None, None).await.unwrap();
            let loader = {
                let orch = orch.clone();
                let id = conv.id.clone();
                tokio::spawn(async move { orch.load_conversation(&id).await })
            };
            let deleter = {
                let orch = orch.clone();
                let id = conv.id.clone();
                tokio::spawn(async move { orch.delete_conversation(&id).await })
            };
            let _ = loader.await.unwrap();
            deleter.await.unwrap().unwrap();

            assert_eq!(orch.repository().active_id().await.unwrap(), None);
            assert!(orch.active().await.is_none());
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn import_racing_delete_keeps_mirror_in_step_with_index() {
        let orch = Arc::new(orchestrator());
        for round in 0..25 {
            let source = orchestrator();
            let conv = source
                .create_conversation(None, Some(format!("round {round}")))
                .await
                .unwrap();
            let blob = source.export_all().await.unwrap();

            let importer = {
                let orch = orch.clone();
                tokio::spawn(async move { orch.import_all(&blob).await })
            };
            let deleter = {
                let orch = orch.clone();
                let id = conv.id.clone();
                tokio::spawn(async move { orch.delete_conversation(&id).await })
            };
            importer.await.unwrap().unwrap();
            let _ = deleter.await.unwrap();

            let mut mirrored: Vec<String> =
                orch.conversations().await.into_iter().map(|e| e.id).collect();
            let mut indexed: Vec<String> = orch
                .repository()
                .list_all()
                .await
                .unwrap()
                .into_iter()
                .map(|e| e.id)
                .collect();
            mirrored.sort();
            indexed.sort();
            assert_eq!(mirrored, indexed);
        }
    }
}
