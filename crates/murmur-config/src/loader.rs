// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./murmur.toml` > `~/.config/murmur/murmur.toml` > `/etc/murmur/murmur.toml`
//! with environment variable overrides via `MURMUR_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::MurmurConfig;

/// Config sections, used to turn `MURMUR_<SECTION>_<KEY>` into `<section>.<key>`.
const SECTIONS: &[&str] = &["storage", "cache", "conversation", "remote", "logging"];

pub(crate) const SYSTEM_CONFIG: &str = "/etc/murmur/murmur.toml";
pub(crate) const LOCAL_CONFIG: &str = "murmur.toml";

/// Path of the per-user config file, if a config directory exists.
pub(crate) fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("murmur").join("murmur.toml"))
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/murmur/murmur.toml` (system-wide)
/// 3. `~/.config/murmur/murmur.toml` (user XDG config)
/// 4. `./murmur.toml` (local directory)
/// 5. `MURMUR_*` environment variables
pub fn load_config() -> Result<MurmurConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no files, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<MurmurConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(MurmurConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<MurmurConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(MurmurConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the layered Figment before extraction.
pub fn build_figment() -> Figment {
    let mut figment = Figment::new()
        .merge(Serialized::defaults(MurmurConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG));
    if let Some(user) = user_config_path() {
        figment = figment.merge(Toml::file(user));
    }
    figment.merge(Toml::file(LOCAL_CONFIG)).merge(env_provider())
}

/// Maps `MURMUR_STORAGE_DATABASE_PATH` to `storage.database_path`.
///
/// Only the first underscore after a known section name becomes a dot, so
/// keys that themselves contain underscores survive intact.
fn env_provider() -> Env {
    Env::prefixed("MURMUR_").map(|key| {
        let key_str = key.as_str().to_ascii_lowercase();
        SECTIONS
            .iter()
            .find_map(|section| {
                key_str
                    .strip_prefix(section)
                    .and_then(|rest| rest.strip_prefix('_'))
                    .map(|rest| format!("{section}.{rest}"))
            })
            .unwrap_or(key_str)
            .into()
    })
}
