// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks semantic constraints serde attributes cannot express, such as
//! non-empty paths, positive capacities, and known log levels.

use crate::diagnostic::ConfigError;
use crate::model::MurmurConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration.
///
/// Collects every violation instead of failing fast.
pub fn validate_config(config: &MurmurConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut invalid = |message: String| errors.push(ConfigError::Validation { message });

    if config.storage.database_path.trim().is_empty() {
        invalid("storage.database_path must not be empty".to_string());
    }

    if config.cache.capacity == 0 {
        invalid("cache.capacity must be at least 1".to_string());
    }

    if config.conversation.default_title.trim().is_empty() {
        invalid("conversation.default_title must not be empty".to_string());
    }

    if config.conversation.title_max_chars == 0 {
        invalid("conversation.title_max_chars must be at least 1".to_string());
    }

    if config.conversation.preview_max_chars == 0 {
        invalid("conversation.preview_max_chars must be at least 1".to_string());
    }

    if config.remote.timeout_secs == 0 {
        invalid("remote.timeout_secs must be at least 1".to_string());
    }

    let level = config.logging.level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        invalid(format!(
            "logging.level `{}` is not one of {}",
            config.logging.level,
            LOG_LEVELS.join(", ")
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_message(errors: &[ConfigError], needle: &str) -> bool {
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains(needle)))
    }

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&MurmurConfig::default()).is_ok());
    }

    #[test]
    fn empty_database_path_fails_validation() {
        let mut config = MurmurConfig::default();
        config.storage.database_path = "  ".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "database_path"));
    }

    #[test]
    fn zero_cache_capacity_fails_validation() {
        let mut config = MurmurConfig::default();
        config.cache.capacity = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "cache.capacity"));
    }

    #[test]
    fn unknown_log_level_fails_validation() {
        let mut config = MurmurConfig::default();
        config.logging.level = "verbose".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "logging.level"));
    }

    #[test]
    fn all_errors_are_collected() {
        let mut config = MurmurConfig::default();
        config.cache.capacity = 0;
        config.conversation.title_max_chars = 0;
        config.conversation.preview_max_chars = 0;
        config.remote.timeout_secs = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn uppercase_log_level_is_accepted() {
        let mut config = MurmurConfig::default();
        config.logging.level = "DEBUG".to_string();
        assert!(validate_config(&config).is_ok());
    }
}
