// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Murmur conversation store.
//!
//! Defines the domain model (conversations, messages, index entries, drafts),
//! the error taxonomy every operation reports through, and the adapter traits
//! that storage backends and remote mirrors implement.

pub mod error;
pub mod time;
pub mod traits;
pub mod types;

pub use error::MurmurError;
pub use time::Timestamp;
pub use traits::{PluginAdapter, RecordStore, RemoteMirror, StoreOp};
pub use types::{
    AdapterType, Attachment, AttachmentKind, Conversation, ConversationMetadata,
    ConversationStats, Draft, GenerationMetadata, HealthStatus, Message, MessagePatch,
    NewMessage, Role, Specialist, truncate_with_ellipsis,
};
