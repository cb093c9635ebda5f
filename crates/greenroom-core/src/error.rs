// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Greenroom coordination layer.

use thiserror::Error;

/// The primary error type used across all Greenroom stores and services.
///
/// Infrastructure failures (`CoordinationUnavailable`, `StorageUnavailable`,
/// `GenerationFailed`) propagate to the inbound-handling boundary unmodified
/// and are never retried internally; re-delivery is a platform concern.
#[derive(Debug, Error)]
pub enum GreenroomError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// The shared coordination store is unreachable. Callers cannot guarantee
    /// exclusivity and must fail closed rather than risk double-processing.
    #[error("coordination store unavailable: {source}")]
    CoordinationUnavailable {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The durable conversation store is unreachable.
    #[error("conversation store unavailable: {source}")]
    StorageUnavailable {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Upstream reply generation failed. No assistant message is persisted.
    #[error("reply generation failed: {message}")]
    GenerationFailed {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A confirm or edit arrived after the preview already resolved.
    #[error("preview already closed: {preview_id}")]
    PreviewAlreadyClosed { preview_id: String },

    /// No preview record exists under this id (never created, or expired).
    #[error("preview not found: {preview_id}")]
    PreviewNotFound { preview_id: String },

    /// A platform adapter failed to deliver confirmed content.
    #[error("delivery failed: {message}")]
    Delivery {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GreenroomError {
    /// True for the fail-closed infrastructure variants that callers must
    /// propagate rather than absorb.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            GreenroomError::CoordinationUnavailable { .. }
                | GreenroomError::StorageUnavailable { .. }
                | GreenroomError::GenerationFailed { .. }
        )
    }
}
