// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Linear-scan search, statistics and list filtering.

use murmur_core::{Conversation, ConversationMetadata, ConversationStats, MurmurError, Specialist};

/// True if `needle` (already lowercase) occurs in the title, any message, or any tag.
pub fn matches(conversation: &Conversation, needle: &str) -> bool {
    conversation.title.to_lowercase().contains(needle)
        || conversation
            .messages
            .iter()
            .any(|m| m.content.to_lowercase().contains(needle))
        || conversation
            .tags
            .iter()
            .any(|t| t.to_lowercase().contains(needle))
}

/// Case-insensitive substring search, preserving input order.
///
/// The query is matched as given, surrounding whitespace included. An empty
/// or whitespace-only query is rejected rather than matching everything.
pub fn search<'a, I>(conversations: I, query: &str) -> Result<Vec<&'a Conversation>, MurmurError>
where
    I: IntoIterator<Item = &'a Conversation>,
{
    if query.trim().is_empty() {
        return Err(MurmurError::Validation(
            "search query must not be empty".into(),
        ));
    }
    let needle = query.to_lowercase();
    Ok(conversations
        .into_iter()
        .filter(|c| matches(c, &needle))
        .collect())
}

/// Totals over `conversations`. The average is zero for an empty set.
pub fn compute_stats<'a, I>(conversations: I) -> ConversationStats
where
    I: IntoIterator<Item = &'a Conversation>,
{
    let mut stats = ConversationStats::default();
    for conversation in conversations {
        stats.total_conversations += 1;
        stats.total_messages += conversation.message_count;
        stats.total_tokens += conversation.tokens_used;
    }
    if stats.total_conversations > 0 {
        stats.average_messages_per_conversation =
            stats.total_messages as f64 / stats.total_conversations as f64;
    }
    stats
}

/// Criteria for listing conversations from the index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    /// `Some(true)` for archived only, `Some(false)` to hide them, `None` for all.
    pub archived: Option<bool>,
    pub favorites_only: bool,
    pub specialist: Option<Specialist>,
    pub tag: Option<String>,
}

impl ListFilter {
    pub fn archived() -> Self {
        Self {
            archived: Some(true),
            ..Self::default()
        }
    }

    pub fn favorites() -> Self {
        Self {
            favorites_only: true,
            ..Self::default()
        }
    }

    pub fn matches(&self, entry: &ConversationMetadata) -> bool {
        self.archived.is_none_or(|archived| entry.is_archived == archived)
            && (!self.favorites_only || entry.is_favorite)
            && self
                .specialist
                .is_none_or(|specialist| entry.specialist == Some(specialist))
            && self.tag.as_ref().is_none_or(|tag| entry.tags.contains(tag))
    }
}
