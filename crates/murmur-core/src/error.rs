// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Murmur conversation store.

use thiserror::Error;

/// The primary error type returned by every storage and orchestration operation.
///
/// Expected conditions (absent records, invalid input) are ordinary variants
/// rather than panics, so callers can always treat a failure as recoverable.
#[derive(Debug, Error)]
pub enum MurmurError {
    /// A conversation, message, or other record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Persisted data could not be encoded or decoded.
    #[error("serialization error: {message}")]
    Serialization {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The request is not valid for the current state (empty query, duplicate id, ...).
    #[error("validation error: {0}")]
    Validation(String),

    /// The underlying durable store is missing, closed, or failing.
    #[error("storage unavailable: {source}")]
    StorageUnavailable {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Configuration errors (invalid TOML, out-of-range values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// The remote mirror rejected or failed a request.
    #[error("remote error: {message}")]
    Remote {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MurmurError {
    /// Shorthand for a missing conversation.
    pub fn conversation_not_found(id: impl Into<String>) -> Self {
        MurmurError::NotFound {
            entity: "conversation",
            id: id.into(),
        }
    }

    /// Shorthand for a missing message.
    pub fn message_not_found(id: impl Into<String>) -> Self {
        MurmurError::NotFound {
            entity: "message",
            id: id.into(),
        }
    }

    /// Wraps any error as a storage failure.
    pub fn storage(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        MurmurError::StorageUnavailable {
            source: Box::new(source),
        }
    }

    /// Storage failure carrying only a message.
    pub fn storage_msg(message: impl Into<String>) -> Self {
        MurmurError::StorageUnavailable {
            source: message.into().into(),
        }
    }

    /// Returns true for the `NotFound` variant.
    pub fn is_not_found(&self) -> bool {
        matches!(self, MurmurError::NotFound { .. })
    }
}

impl From<serde_json::Error> for MurmurError {
    fn from(e: serde_json::Error) -> Self {
        MurmurError::Serialization {
            message: e.to_string(),
            source: Some(Box::new(e)),
        }
    }
}
