// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persisted key namespace.
//!
//! | Key | Contents |
//! |---|---|
//! | `conversations.index` | ordered list of index entries |
//! | `conversation.<id>` | full conversation record |
//! | `draft.<id>` | draft text and save time |
//! | `activeConversationId` | id of the active conversation |
//!
//! Record and draft keys use different prefixes, and neither prefix is a
//! prefix of `conversations.index`, so the namespaces never overlap.

pub const INDEX_KEY: &str = "conversations.index";
pub const ACTIVE_CONVERSATION_KEY: &str = "activeConversationId";
pub const CONVERSATION_PREFIX: &str = "conversation.";
pub const DRAFT_PREFIX: &str = "draft.";

/// Key of the full record for `id`.
pub fn conversation_key(id: &str) -> String {
    format!("{CONVERSATION_PREFIX}{id}")
}

/// Key of the draft for `id`.
pub fn draft_key(id: &str) -> String {
    format!("{DRAFT_PREFIX}{id}")
}

/// Recovers the conversation id from a record key.
pub fn conversation_id_from_key(key: &str) -> Option<&str> {
    key.strip_prefix(CONVERSATION_PREFIX).filter(|id| !id.is_empty())
}

/// Recovers the conversation id from a draft key.
pub fn draft_id_from_key(key: &str) -> Option<&str> {
    key.strip_prefix(DRAFT_PREFIX).filter(|id| !id.is_empty())
}
