// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-conversation draft text.
//!
//! Drafts live under their own key namespace and never touch message history.

use std::sync::Arc;

use tracing::debug;

use murmur_core::{Draft, MurmurError, RecordStore, Timestamp};
use murmur_storage::{codec, keys};

pub struct DraftStore {
    store: Arc<dyn RecordStore>,
}

impl DraftStore {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Saves `text` for `conversation_id` exactly as given, replacing any
    /// earlier draft.
    pub async fn save(&self, conversation_id: &str, text: &str) -> Result<Draft, MurmurError> {
        let draft = Draft {
            text: text.to_string(),
            saved_at: Timestamp::now(),
        };
        self.store
            .put(&keys::draft_key(conversation_id), &codec::encode(&draft)?)
            .await?;
        debug!(conversation_id, chars = text.chars().count(), "draft saved");
        Ok(draft)
    }

    /// The draft text, or an empty string when there is none.
    pub async fn text(&self, conversation_id: &str) -> Result<String, MurmurError> {
        Ok(self
            .get(conversation_id)
            .await?
            .map(|draft| draft.text)
            .unwrap_or_default())
    }

    /// The full draft record, if any.
    pub async fn get(&self, conversation_id: &str) -> Result<Option<Draft>, MurmurError> {
        match self.store.get(&keys::draft_key(conversation_id)).await? {
            Some(raw) => Ok(Some(codec::decode(&raw)?)),
            None => Ok(None),
        }
    }

    /// Removes the draft. Returns whether one existed.
    pub async fn clear(&self, conversation_id: &str) -> Result<bool, MurmurError> {
        let removed = self.store.remove(&keys::draft_key(conversation_id)).await?;
        if removed {
            debug!(conversation_id, "draft cleared");
        }
        Ok(removed)
    }

    /// Ids of every conversation that has a draft.
    pub async fn conversation_ids(&self) -> Result<Vec<String>, MurmurError> {
        Ok(self
            .store
            .list_keys(keys::DRAFT_PREFIX)
            .await?
            .iter()
            .filter_map(|key| keys::draft_id_from_key(key))
            .map(str::to_string)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_storage::MemoryStore;

    fn drafts() -> DraftStore {
        DraftStore::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn missing_draft_is_empty_text() {
        let drafts = drafts();
        assert_eq!(drafts.text("c1").await.unwrap(), "");
        assert!(drafts.get("c1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_then_read_back() {
        let drafts = drafts();
        let saved = drafts.save("c1", "half written").await.unwrap();
        assert_eq!(drafts.text("c1").await.unwrap(), "half written");
        assert_eq!(drafts.get("c1").await.unwrap().unwrap(), saved);
    }

    #[tokio::test]
    async fn drafts_are_independent_per_conversation() {
        let drafts = drafts();
        drafts.save("a", "for a").await.unwrap();
        assert_eq!(drafts.text("b").await.unwrap(), "");
        drafts.save("b", "for b").await.unwrap();
        assert!(drafts.clear("a").await.unwrap());
        assert_eq!(drafts.text("a").await.unwrap(), "");
        assert_eq!(drafts.text("b").await.unwrap(), "for b");
        assert_eq!(drafts.conversation_ids().await.unwrap(), vec!["b"]);
    }

    #[tokio::test]
    async fn whitespace_text_is_stored_verbatim() {
        let drafts = drafts();
        drafts.save("a", "something").await.unwrap();
        let saved = drafts.save("a", "  \n ").await.unwrap();
        assert_eq!(saved.text, "  \n ");
        assert_eq!(drafts.text("a").await.unwrap(), "  \n ");
        assert_eq!(drafts.conversation_ids().await.unwrap(), vec!["a"]);
    }

    #[tokio::test]
    async fn clear_missing_is_not_an_error() {
        assert!(!drafts().clear("nope").await.unwrap());
    }
}
