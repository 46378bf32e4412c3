// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation management for Murmur.
//!
//! Layers, bottom to top:
//! - [`cache`]: bounded LRU over decoded conversations
//! - [`index`]: the persisted list of conversation summaries
//! - [`repository`]: record + index + cache kept consistent per conversation
//! - [`drafts`], [`search`], [`transfer`]: side features over the repository
//! - [`orchestrator`]: the stateful facade presentation code talks to

pub mod cache;
pub mod drafts;
pub mod events;
pub mod index;
pub mod orchestrator;
pub mod queue;
pub mod remote;
pub mod repository;
pub mod search;
pub mod transfer;

pub use cache::{CacheStats, LruCache};
pub use drafts::DraftStore;
pub use events::ConversationEvent;
pub use index::SecondaryIndex;
pub use orchestrator::{ConversationOrchestrator, OperationFlags};
pub use queue::{ConversationGuard, MutationQueue};
pub use remote::{NoopMirror, RemoteSync};
pub use repository::{ConversationRepository, Inconsistency, RepositoryOptions};
pub use search::ListFilter;
pub use transfer::{ExportBundle, ImportReport};
