// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./greenroom.toml` > `~/.config/greenroom/greenroom.toml`
//! > `/etc/greenroom/greenroom.toml` with environment variable overrides via
//! `GREENROOM_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::GreenroomConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/greenroom/greenroom.toml` (system-wide)
/// 3. `~/.config/greenroom/greenroom.toml` (user XDG config)
/// 4. `./greenroom.toml` (local directory)
/// 5. `GREENROOM_*` environment variables
pub fn load_config() -> Result<GreenroomConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(GreenroomConfig::default()))
        .merge(Toml::file("/etc/greenroom/greenroom.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("greenroom/greenroom.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("greenroom.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<GreenroomConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(GreenroomConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<GreenroomConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(GreenroomConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` so underscore-containing
/// key names stay unambiguous: `GREENROOM_COORDINATION_BUSY_TIMEOUT_MS` must
/// map to `coordination.busy_timeout_ms`, not `coordination.busy.timeout.ms`.
fn env_provider() -> Env {
    Env::prefixed("GREENROOM_").map(|key| map_env_key(key.as_str()).into())
}

/// Map a lowercased, prefix-stripped env var name onto a dotted config key.
/// Example: `GREENROOM_PREVIEW_TIMEOUT_SECS` arrives as
/// `preview_timeout_secs` and maps to `preview.timeout_secs`.
fn map_env_key(key_str: &str) -> String {
    key_str
        .replacen("process_", "process.", 1)
        .replacen("storage_", "storage.", 1)
        .replacen("coordination_", "coordination.", 1)
        .replacen("conversation_", "conversation.", 1)
        .replacen("preview_", "preview.", 1)
        .replacen("dedup_", "dedup.", 1)
}
