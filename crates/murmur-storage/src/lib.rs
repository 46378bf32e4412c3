// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence layer for the Murmur conversation store.
//!
//! Provides a versioned record codec, the persisted key namespace, a
//! WAL-mode SQLite [`RecordStore`](murmur_core::RecordStore) with embedded
//! migrations and a single-writer connection via `tokio-rusqlite`, and an
//! in-memory store for tests and ephemeral sessions.

pub mod adapter;
pub mod codec;
pub mod database;
pub mod keys;
pub mod memory;
pub mod migrations;
pub mod queries;

pub use adapter::SqliteStore;
pub use database::Database;
pub use memory::MemoryStore;
