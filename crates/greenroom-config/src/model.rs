// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Greenroom coordination layer.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use greenroom_core::ProcessRole;
use serde::{Deserialize, Serialize};

/// Top-level Greenroom configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GreenroomConfig {
    /// Process identity and tiering settings.
    #[serde(default)]
    pub process: ProcessConfig,

    /// Conversation store settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Shared coordination store settings.
    #[serde(default)]
    pub coordination: CoordinationConfig,

    /// Conversation manager settings.
    #[serde(default)]
    pub conversation: ConversationConfig,

    /// Preview workflow settings.
    #[serde(default)]
    pub preview: PreviewConfig,

    /// Message deduplication settings.
    #[serde(default)]
    pub dedup: DedupConfig,
}

impl GreenroomConfig {
    /// Dedup claim TTL: preview timeout plus the configured safety margin, so
    /// a webhook retry arriving after a slow preview cycle is still seen as a
    /// duplicate. With preview disabled the margin alone bounds the window.
    pub fn dedup_window(&self) -> Duration {
        let secs = if self.preview.enabled {
            self.preview.timeout_secs + self.dedup.window_margin_secs
        } else {
            self.dedup.window_margin_secs
        };
        Duration::from_secs(secs)
    }

    /// How long preview records stay readable in the coordination store.
    /// Outlives the timeout by the dedup margin so a late confirm still gets
    /// a `PreviewAlreadyClosed` answer instead of "not found".
    pub fn preview_record_ttl(&self) -> Duration {
        Duration::from_secs(self.preview.timeout_secs + self.dedup.window_margin_secs)
    }
}

/// Process identity and tiering configuration.
///
/// Exactly one process in a deployment should be configured `role = "primary"`;
/// the role is never inferred at runtime.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessConfig {
    /// Process tier: `"primary"` runs the timeout scanner and the
    /// authoritative conversation cache; `"secondary"` reads and writes
    /// through the stores directly.
    #[serde(default = "default_role")]
    pub role: ProcessRole,

    /// Stable label identifying this process in coordination-store claims.
    /// Defaults to `<hostname>-<pid>` when unset.
    #[serde(default)]
    pub instance_id: Option<String>,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl ProcessConfig {
    /// The label this process presents in coordination-store claims.
    /// Explicit `instance_id` wins; otherwise `<hostname>-<pid>`.
    pub fn effective_instance_id(&self) -> String {
        match &self.instance_id {
            Some(id) => id.clone(),
            None => format!("{}-{}", hostname(), std::process::id()),
        }
    }
}

/// Best-effort hostname: environment first, then `/etc/hostname`.
fn hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .or_else(|| std::fs::read_to_string("/etc/hostname").ok())
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            role: default_role(),
            instance_id: None,
            log_level: default_log_level(),
        }
    }
}

fn default_role() -> ProcessRole {
    // An unconfigured extra worker must never steal the scanner.
    ProcessRole::Secondary
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Conversation store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the conversations SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("greenroom").join("greenroom.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("greenroom.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Shared coordination store configuration.
///
/// Every worker process in a deployment must point at the same coordination
/// database file; it is the only resource mutated by more than one process.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CoordinationConfig {
    /// Path to the coordination SQLite database file.
    #[serde(default = "default_coordination_path")]
    pub database_path: String,

    /// SQLite busy timeout in milliseconds. Bounds how long one process waits
    /// on another's write transaction before reporting unavailability.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            database_path: default_coordination_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

fn default_coordination_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("greenroom").join("coordination.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("coordination.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

/// Conversation manager configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConversationConfig {
    /// Inactivity TTL in seconds. A conversation older than this is no
    /// longer "active" and a new one is created for the next message.
    #[serde(default = "default_conversation_ttl_secs")]
    pub ttl_secs: u64,

    /// Interval between cache eviction sweeps on the primary, in seconds.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Maximum number of history messages handed to the reply generator.
    #[serde(default = "default_history_limit")]
    pub history_limit: u32,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_conversation_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            history_limit: default_history_limit(),
        }
    }
}

fn default_conversation_ttl_secs() -> u64 {
    1800 // 30 minutes
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_history_limit() -> u32 {
    50
}

/// Preview workflow configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PreviewConfig {
    /// Hold generated replies for human review before delivery. When false,
    /// replies deliver immediately.
    #[serde(default = "default_preview_enabled")]
    pub enabled: bool,

    /// Seconds a preview may wait for confirmation before the scanner
    /// auto-delivers the original content.
    #[serde(default = "default_preview_timeout_secs")]
    pub timeout_secs: u64,

    /// Interval between timeout scans on the primary, in seconds. A preview
    /// is never resolved more than one scan interval past its deadline.
    #[serde(default = "default_scan_interval_secs")]
    pub scan_interval_secs: u64,

    /// Base URL for the human-facing review reference returned with pending
    /// previews.
    #[serde(default = "default_review_base_url")]
    pub review_base_url: String,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            enabled: default_preview_enabled(),
            timeout_secs: default_preview_timeout_secs(),
            scan_interval_secs: default_scan_interval_secs(),
            review_base_url: default_review_base_url(),
        }
    }
}

fn default_preview_enabled() -> bool {
    false
}

fn default_preview_timeout_secs() -> u64 {
    120
}

fn default_scan_interval_secs() -> u64 {
    5
}

fn default_review_base_url() -> String {
    "http://localhost:8700/previews".to_string()
}

/// Message deduplication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DedupConfig {
    /// Safety margin in seconds added to the preview timeout when computing
    /// the dedup claim TTL.
    #[serde(default = "default_window_margin_secs")]
    pub window_margin_secs: u64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            window_margin_secs: default_window_margin_secs(),
        }
    }
}

fn default_window_margin_secs() -> u64 {
    300
}
