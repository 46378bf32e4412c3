// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the storage, conversation, and binary crates.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::time::Timestamp;

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a trait object.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    RecordStore,
    RemoteMirror,
}

/// Author of a message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// The assistant persona a conversation was started with.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Specialist {
    General,
    Coding,
    Writing,
    Research,
    Health,
    Finance,
    Legal,
    Education,
}

/// Coarse classification of an attached file.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    Document,
    Audio,
    Video,
    Other,
}

impl AttachmentKind {
    /// Classifies a MIME type such as `image/png` or `application/pdf`.
    pub fn from_mime(mime: &str) -> Self {
        let mime = mime.to_ascii_lowercase();
        match mime.split('/').next().unwrap_or_default() {
            "image" => AttachmentKind::Image,
            "audio" => AttachmentKind::Audio,
            "video" => AttachmentKind::Video,
            "text" => AttachmentKind::Document,
            "application"
                if mime.contains("pdf")
                    || mime.contains("word")
                    || mime.contains("document")
                    || mime.contains("sheet")
                    || mime.contains("presentation")
                    || mime.contains("json") =>
            {
                AttachmentKind::Document
            }
            _ => AttachmentKind::Other,
        }
    }
}

/// A file attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub kind: AttachmentKind,
    pub size_bytes: u64,
    /// Where the content lives (local path or remote URL).
    pub uri: String,
    /// Upload progress in percent, 0..=100.
    #[serde(default)]
    pub upload_progress: u8,
}

/// Details about how an assistant message was generated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub tokens_used: u64,
}

/// A single message within a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    /// Set once at creation.
    pub timestamp: Timestamp,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<GenerationMetadata>,
    /// Transient "assistant is typing" placeholder. Never persisted.
    #[serde(skip)]
    pub is_typing: bool,
}

impl Message {
    /// Tokens attributed to this message by its generation metadata.
    pub fn tokens(&self) -> u64 {
        self.metadata.as_ref().map_or(0, |m| m.tokens_used)
    }
}

/// Input for appending a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub role: Role,
    pub content: String,
    pub attachments: Vec<Attachment>,
    pub metadata: Option<GenerationMetadata>,
}

impl NewMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            attachments: Vec::new(),
            metadata: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            attachments: Vec::new(),
            metadata: None,
        }
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    pub fn with_metadata(mut self, metadata: GenerationMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Partial update of an existing message. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessagePatch {
    pub content: Option<String>,
    pub attachments: Option<Vec<Attachment>>,
    pub metadata: Option<GenerationMetadata>,
}

/// A full conversation record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub title: String,
    /// Insertion order is display order.
    #[serde(default)]
    pub messages: Vec<Message>,
    pub created_at: Timestamp,
    /// Last activity. Never moves backwards.
    pub updated_at: Timestamp,
    /// Always equal to `messages.len()` once persisted.
    #[serde(default)]
    pub message_count: usize,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialist: Option<Specialist>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    /// Running total of generation tokens. Never decreases.
    #[serde(default)]
    pub tokens_used: u64,
}

impl Conversation {
    /// Creates an empty conversation stamped with `now`.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        specialist: Option<Specialist>,
        now: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
            message_count: 0,
            is_archived: false,
            is_favorite: false,
            tags: BTreeSet::new(),
            specialist,
            owner_id: None,
            tokens_used: 0,
        }
    }

    /// Advances `updated_at` to `now` unless it is already later.
    pub fn touch(&mut self, now: Timestamp) {
        self.updated_at = self.updated_at.max(now);
    }

    /// Position of the message with the given id.
    pub fn message_index(&self, message_id: &str) -> Option<usize> {
        self.messages.iter().position(|m| m.id == message_id)
    }

    /// Last message that is not a typing placeholder.
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| !m.is_typing)
    }

    /// Derives the index entry for this record.
    ///
    /// The projection is a pure function of the record, so re-deriving it
    /// from a freshly loaded copy always yields an identical entry.
    pub fn project(&self, preview_max_chars: usize) -> ConversationMetadata {
        ConversationMetadata {
            id: self.id.clone(),
            title: self.title.clone(),
            last_message: self
                .last_message()
                .map(|m| truncate_with_ellipsis(&m.content, preview_max_chars)),
            last_activity: self.updated_at,
            message_count: self.message_count,
            is_archived: self.is_archived,
            is_favorite: self.is_favorite,
            tags: self.tags.clone(),
            specialist: self.specialist,
        }
    }
}

/// Compact index entry for one conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMetadata {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,
    pub last_activity: Timestamp,
    pub message_count: usize,
    pub is_archived: bool,
    pub is_favorite: bool,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialist: Option<Specialist>,
}

/// Unsent text for a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub text: String,
    pub saved_at: Timestamp,
}

/// Aggregate numbers over every stored conversation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationStats {
    pub total_conversations: usize,
    pub total_messages: usize,
    pub total_tokens: u64,
    /// Zero when there are no conversations.
    pub average_messages_per_conversation: f64,
}

/// Truncates `text` to at most `max_chars` characters, appending `...` when cut.
///
/// Counts characters, not bytes, so multi-byte text is never split mid-codepoint.
pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}
