// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Export bundles and import normalization.
//!
//! A bundle is `{"format":"murmur-export","version":1,"exported_at":...,
//! "conversations":[...]}` wrapped in the record codec envelope.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::warn;

use murmur_core::{Conversation, MurmurError, Timestamp};
use murmur_storage::codec;

pub const EXPORT_FORMAT: &str = "murmur-export";
pub const EXPORT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportBundle {
    pub format: String,
    pub version: u32,
    pub exported_at: Timestamp,
    pub conversations: Vec<Conversation>,
}

impl ExportBundle {
    pub fn new(conversations: Vec<Conversation>, exported_at: Timestamp) -> Self {
        Self {
            format: EXPORT_FORMAT.to_string(),
            version: EXPORT_VERSION,
            exported_at,
            conversations,
        }
    }

    pub fn encode(&self) -> Result<String, MurmurError> {
        codec::encode(self)
    }

    /// Decodes and checks the bundle header.
    pub fn decode(blob: &str) -> Result<Self, MurmurError> {
        let bundle: ExportBundle = codec::decode(blob)?;
        if bundle.format != EXPORT_FORMAT {
            return Err(MurmurError::Validation(format!(
                "not a murmur export (format `{}`)",
                bundle.format
            )));
        }
        if bundle.version == 0 || bundle.version > EXPORT_VERSION {
            return Err(MurmurError::Validation(format!(
                "unsupported export version {}",
                bundle.version
            )));
        }
        Ok(bundle)
    }
}

/// Outcome of an import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
}

/// Repairs an imported conversation so it satisfies the record invariants.
///
/// Empty ids are rejected. Blank titles fall back to `default_title`, typing
/// placeholders and repeated message ids are dropped, blank tags removed,
/// and the counters and activity time are raised to match the messages.
pub fn normalize_import(
    mut conversation: Conversation,
    default_title: &str,
) -> Result<Conversation, MurmurError> {
    conversation.id = conversation.id.trim().to_string();
    if conversation.id.is_empty() {
        return Err(MurmurError::Validation(
            "imported conversation has an empty id".into(),
        ));
    }
    if conversation.title.trim().is_empty() {
        conversation.title = default_title.to_string();
    }

    let mut seen = HashSet::new();
    let before = conversation.messages.len();
    conversation
        .messages
        .retain(|m| !m.is_typing && !m.id.is_empty() && seen.insert(m.id.clone()));
    if conversation.messages.len() != before {
        warn!(
            conversation_id = %conversation.id,
            dropped = before - conversation.messages.len(),
            "dropped invalid or repeated messages on import"
        );
    }
    conversation.message_count = conversation.messages.len();

    conversation.tags = conversation
        .tags
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();

    let message_tokens: u64 = conversation.messages.iter().map(|m| m.tokens()).sum();
    conversation.tokens_used = conversation.tokens_used.max(message_tokens);

    let created_at = conversation.created_at;
    conversation.touch(created_at);
    if let Some(latest) = conversation.messages.iter().map(|m| m.timestamp).max() {
        conversation.touch(latest);
    }
    Ok(conversation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_core::{GenerationMetadata, Message, Role};

    fn ts(ms: i64) -> Timestamp {
        Timestamp::from_millis(ms).unwrap()
    }

    fn message(id: &str, at: i64, tokens: u64) -> Message {
        Message {
            id: id.into(),
            role: Role::Assistant,
            content: "text".into(),
            timestamp: ts(at),
            attachments: Vec::new(),
            metadata: Some(GenerationMetadata {
                model: None,
                tokens_used: tokens,
            }),
            is_typing: false,
        }
    }

    #[test]
    fn bundle_round_trips() {
        let bundle = ExportBundle::new(vec![Conversation::new("a", "A", None, ts(1))], ts(99));
        let decoded = ExportBundle::decode(&bundle.encode().unwrap()).unwrap();
        assert_eq!(decoded, bundle);
    }

    #[test]
    fn foreign_format_is_rejected() {
        let mut bundle = ExportBundle::new(Vec::new(), ts(1));
        bundle.format = "something-else".into();
        let err = ExportBundle::decode(&bundle.encode().unwrap()).unwrap_err();
        assert!(matches!(err, MurmurError::Validation(_)));
    }

    #[test]
    fn newer_version_is_rejected() {
        let mut bundle = ExportBundle::new(Vec::new(), ts(1));
        bundle.version = EXPORT_VERSION + 1;
        assert!(ExportBundle::decode(&bundle.encode().unwrap()).is_err());
    }

    #[test]
    fn malformed_blob_is_serialization_error() {
        let err = ExportBundle::decode("{{{").unwrap_err();
        assert!(matches!(err, MurmurError::Serialization { .. }));
    }

    #[test]
    fn normalize_repairs_counters_and_activity() {
        let mut conv = Conversation::new(" a ", "  ", None, ts(10));
        conv.messages.push(message("m1", 50, 7));
        conv.messages.push(message("m1", 60, 3));
        conv.messages.push(message("m2", 40, 5));
        conv.message_count = 99;
        conv.tags.insert("  ".into());
        conv.tags.insert(" work ".into());

        let fixed = normalize_import(conv, "New Conversation").unwrap();
        assert_eq!(fixed.id, "a");
        assert_eq!(fixed.title, "New Conversation");
        assert_eq!(fixed.message_count, 2);
        assert_eq!(fixed.tokens_used, 12);
        assert_eq!(fixed.updated_at, ts(50));
        assert_eq!(fixed.tags.iter().collect::<Vec<_>>(), vec!["work"]);
    }

    #[test]
    fn normalize_rejects_empty_id() {
        let conv = Conversation::new("   ", "t", None, ts(1));
        assert!(matches!(
            normalize_import(conv, "x"),
            Err(MurmurError::Validation(_))
        ));
    }
}
