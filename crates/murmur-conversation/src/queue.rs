// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-conversation mutation ordering.
//!
//! Each conversation id maps to its own async mutex. Holding the guard for an
//! id orders every read-modify-write against that record; different ids never
//! wait on each other. A slot is dropped from the registry once no guard or
//! waiter refers to it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Slots = Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>;

#[derive(Default)]
pub struct MutationQueue {
    slots: Slots,
}

impl MutationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until every earlier holder for `id` has finished, then returns
    /// the exclusive guard. Waiters are served in arrival order.
    pub async fn lock(&self, id: &str) -> ConversationGuard {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.entry(id.to_string()).or_default().clone()
        };
        let guard = slot.lock_owned().await;
        ConversationGuard {
            id: id.to_string(),
            slots: self.slots.clone(),
            _guard: guard,
        }
    }

    /// Number of ids with a live guard or waiter.
    pub fn active_ids(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Exclusive right to mutate one conversation.
pub struct ConversationGuard {
    id: String,
    slots: Slots,
    _guard: OwnedMutexGuard<()>,
}

impl ConversationGuard {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl std::fmt::Debug for ConversationGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationGuard").field("id", &self.id).finish()
    }
}

impl Drop for ConversationGuard {
    fn drop(&mut self) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        // The registry and this guard are the only references left: nobody is waiting.
        if slots
            .get(&self.id)
            .is_some_and(|slot| Arc::strong_count(slot) <= 2)
        {
            slots.remove(&self.id);
        }
    }
}
