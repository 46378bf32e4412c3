// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Murmur integration tests.
//!
//! Provides mock adapters and a harness for fast, deterministic tests
//! against a throwaway database.
//!
//! # Components
//!
//! - [`MockRemote`] - Remote mirror that records calls and can be told to fail
//! - [`FlakyStore`] - Record store wrapper whose writes can be switched off
//! - [`TestHarness`] - Orchestrator over a temp SQLite store

pub mod flaky_store;
pub mod harness;
pub mod mock_remote;

pub use flaky_store::FlakyStore;
pub use harness::TestHarness;
pub use mock_remote::{MockRemote, RemoteCall};
