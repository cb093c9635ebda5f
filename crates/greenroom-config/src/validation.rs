// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as non-empty paths, positive intervals, and the relation
//! between the preview timeout and the scan interval.

use crate::diagnostic::ConfigError;
use crate::model::GreenroomConfig;

const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &GreenroomConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !VALID_LOG_LEVELS.contains(&config.process.log_level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "process.log_level must be one of {}, got `{}`",
                VALID_LOG_LEVELS.join(", "),
                config.process.log_level
            ),
        });
    }

    if let Some(instance_id) = &config.process.instance_id
        && instance_id.trim().is_empty()
    {
        errors.push(ConfigError::Validation {
            message: "process.instance_id must not be empty when set".to_string(),
        });
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if config.coordination.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "coordination.database_path must not be empty".to_string(),
        });
    }

    if config.coordination.busy_timeout_ms == 0 {
        errors.push(ConfigError::Validation {
            message: "coordination.busy_timeout_ms must be positive".to_string(),
        });
    }

    if config.conversation.ttl_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "conversation.ttl_secs must be positive".to_string(),
        });
    }

    if config.conversation.sweep_interval_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "conversation.sweep_interval_secs must be positive".to_string(),
        });
    }

    if config.conversation.history_limit == 0 {
        errors.push(ConfigError::Validation {
            message: "conversation.history_limit must be positive".to_string(),
        });
    }

    if config.preview.timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "preview.timeout_secs must be positive".to_string(),
        });
    }

    if config.preview.scan_interval_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "preview.scan_interval_secs must be positive".to_string(),
        });
    }

    // A scan interval longer than the timeout makes every preview resolve
    // late; the scanner guarantees at most one interval of lateness.
    if config.preview.enabled && config.preview.scan_interval_secs > config.preview.timeout_secs {
        errors.push(ConfigError::Validation {
            message: format!(
                "preview.scan_interval_secs ({}) must not exceed preview.timeout_secs ({})",
                config.preview.scan_interval_secs, config.preview.timeout_secs
            ),
        });
    }

    if config.preview.enabled && config.preview.review_base_url.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "preview.review_base_url must not be empty when preview is enabled"
                .to_string(),
        });
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
