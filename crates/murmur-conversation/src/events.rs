// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Change notifications published by the orchestrator.

/// Something observable changed, or an operation failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationEvent {
    Created { id: String },
    Updated { id: String },
    Deleted { id: String },
    /// The active conversation changed; `None` means nothing is active.
    ActiveChanged { id: Option<String> },
    /// A user-facing operation failed. The mirror was left unchanged.
    Failed {
        operation: &'static str,
        message: String,
    },
}
