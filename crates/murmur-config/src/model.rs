// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Murmur configuration.
///
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MurmurConfig {
    /// Durable storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// In-memory record cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Conversation presentation rules (titles, previews).
    #[serde(default)]
    pub conversation: ConversationConfig,

    /// Remote mirroring settings.
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,

    /// How long a write waits on a locked database before failing.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("murmur").join("murmur.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("murmur.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

/// Bounded record cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Maximum number of full conversations held in memory.
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
        }
    }
}

fn default_cache_capacity() -> usize {
    50
}

/// Title and preview rules.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConversationConfig {
    /// Title given to conversations created without one.
    #[serde(default = "default_title")]
    pub default_title: String,

    /// Longest automatic title derived from the first user message, in characters.
    #[serde(default = "default_title_max_chars")]
    pub title_max_chars: usize,

    /// Longest last-message preview stored in the index, in characters.
    #[serde(default = "default_preview_max_chars")]
    pub preview_max_chars: usize,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            default_title: default_title(),
            title_max_chars: default_title_max_chars(),
            preview_max_chars: default_preview_max_chars(),
        }
    }
}

fn default_title() -> String {
    "New Conversation".to_string()
}

fn default_title_max_chars() -> usize {
    50
}

fn default_preview_max_chars() -> usize {
    100
}

/// Remote mirror configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RemoteConfig {
    /// Forward creates, updates, and deletes to the remote mirror.
    #[serde(default)]
    pub enabled: bool,

    /// Upper bound on a single mirror call before it is abandoned.
    #[serde(default = "default_remote_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            timeout_secs: default_remote_timeout_secs(),
        }
    }
}

fn default_remote_timeout_secs() -> u64 {
    10
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
