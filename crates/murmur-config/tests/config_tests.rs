// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Murmur configuration system.

use std::io::Write;

use murmur_config::diagnostic::{ConfigError, suggest_key};
use murmur_config::{load_and_validate_path, load_and_validate_str, load_config_from_str};

/// Valid TOML with all known fields deserializes successfully.
#[test]
fn valid_toml_deserializes_into_murmur_config() {
    let toml = r#"
[storage]
database_path = "/tmp/chat.db"
wal_mode = false
busy_timeout_ms = 250

[cache]
capacity = 8

[conversation]
default_title = "Untitled"
title_max_chars = 20
preview_max_chars = 40

[remote]
enabled = true
timeout_secs = 3

[logging]
level = "debug"
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.storage.database_path, "/tmp/chat.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.storage.busy_timeout_ms, 250);
    assert_eq!(config.cache.capacity, 8);
    assert_eq!(config.conversation.default_title, "Untitled");
    assert_eq!(config.conversation.title_max_chars, 20);
    assert_eq!(config.conversation.preview_max_chars, 40);
    assert!(config.remote.enabled);
    assert_eq!(config.remote.timeout_secs, 3);
    assert_eq!(config.logging.level, "debug");
}

/// Empty input falls back to compiled defaults.
#[test]
fn empty_toml_uses_defaults() {
    let config = load_and_validate_str("").expect("defaults are valid");
    assert_eq!(config.cache.capacity, 50);
    assert_eq!(config.conversation.default_title, "New Conversation");
    assert!(!config.remote.enabled);
}

/// A typo in a key yields an UnknownKey error with a suggestion.
#[test]
fn typo_in_cache_section_suggests_correct_key() {
    let toml = "[cache]\ncapacty = 10\n";
    let errors = load_and_validate_str(toml).unwrap_err();
    let unknown = errors.iter().find_map(|e| match e {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => Some((key.clone(), suggestion.clone())),
        _ => None,
    });
    let (key, suggestion) = unknown.expect("expected an UnknownKey error");
    assert_eq!(key, "capacty");
    assert_eq!(suggestion.as_deref(), Some("capacity"));
}

/// Unknown sections are rejected by the top-level struct.
#[test]
fn unknown_section_is_rejected() {
    let toml = "[telemetry]\nenabled = true\n";
    let errors = load_and_validate_str(toml).unwrap_err();
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::UnknownKey { key, .. } if key == "telemetry"))
    );
}

/// Wrong value types surface as InvalidType.
#[test]
fn string_capacity_is_invalid_type() {
    let toml = "[cache]\ncapacity = \"lots\"\n";
    let errors = load_and_validate_str(toml).unwrap_err();
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidType { .. }))
    );
}

/// Values that parse but violate constraints fail validation.
#[test]
fn zero_capacity_fails_validation() {
    let toml = "[cache]\ncapacity = 0\n";
    let errors = load_and_validate_str(toml).unwrap_err();
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], ConfigError::Validation { .. }));
}

#[test]
fn suggest_key_ignores_distant_names() {
    assert_eq!(suggest_key("zzzz", &["capacity", "enabled"]), None);
}

#[test]
fn explicit_path_is_loaded() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[conversation]\ntitle_max_chars = 30").unwrap();
    let config = load_and_validate_path(file.path()).unwrap();
    assert_eq!(config.conversation.title_max_chars, 30);
}
