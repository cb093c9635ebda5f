// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared across the Greenroom workspace.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// A bounded exchange between one sender and the system on one platform.
///
/// At most one conversation is active per (sender, platform) pair, where
/// "active" means within the configured inactivity TTL of `last_active_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Globally unique opaque identifier (UUID v4 string).
    pub id: String,
    pub sender_id: String,
    pub display_name: String,
    pub platform: String,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
    /// RFC 3339 timestamp of the most recent message or touch.
    pub last_active_at: String,
    pub message_count: i64,
}

/// Role of a message within a conversation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// A persisted message. Sequence numbers are assigned by the conversation
/// store at insert time and are strictly increasing and contiguous per
/// conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    /// 1-based position within the conversation, assigned at persistence.
    pub seq: i64,
    pub role: MessageRole,
    pub content: String,
    /// True if this assistant message was auto-delivered after a preview
    /// timeout rather than confirmed by a human.
    pub is_timeout: bool,
    pub created_at: String,
}

/// Fields the caller supplies when appending a message; id, seq, and
/// timestamp are filled in by the store.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub conversation_id: String,
    pub role: MessageRole,
    pub content: String,
    pub is_timeout: bool,
}

impl NewMessage {
    pub fn user(conversation_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            role: MessageRole::User,
            content: content.into(),
            is_timeout: false,
        }
    }

    pub fn assistant(
        conversation_id: impl Into<String>,
        content: impl Into<String>,
        is_timeout: bool,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            role: MessageRole::Assistant,
            content: content.into(),
            is_timeout,
        }
    }
}

/// State of a preview request.
///
/// `PendingConfirmation -> {Confirmed, TimedOut} -> Closed`; the two
/// intermediate resolutions exist so compare-and-swap can arbitrate a racing
/// confirm against a racing timeout scan, and `Closed` is terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PreviewState {
    PendingConfirmation,
    Confirmed,
    TimedOut,
    Closed,
}

/// Which path resolved a preview. Retained after closure for audit.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PreviewResolution {
    Confirmed,
    TimedOut,
}

/// A generated reply held for human review before delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewRequest {
    /// Globally unique preview id (UUID v4 string).
    pub id: String,
    pub conversation_id: String,
    /// Id of the user message this reply answers. Exactly one preview may be
    /// pending per (conversation, message) pair.
    pub message_id: String,
    pub sender_id: String,
    pub platform: String,
    /// The reply as generated. Never overwritten; timeouts deliver this.
    pub original_content: String,
    /// Human-edited replacement, if any. Confirmation delivers this when set.
    pub edited_content: Option<String>,
    /// Request/response context captured for audit and debugging.
    pub context: serde_json::Value,
    /// Wall-clock generation latency in milliseconds.
    pub latency_ms: i64,
    pub state: PreviewState,
    pub resolution: Option<PreviewResolution>,
    pub created_at: String,
    pub updated_at: String,
}

impl PreviewRequest {
    /// Edited content if present, else the original generated content.
    pub fn effective_content(&self) -> &str {
        self.edited_content.as_deref().unwrap_or(&self.original_content)
    }

    pub fn is_closed(&self) -> bool {
        self.state == PreviewState::Closed
    }
}

/// Platform-supplied identifiers that sharpen the dedup fingerprint.
/// Adapters normalize their payload shapes into this before the core sees
/// anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintHints {
    pub message_id: Option<String>,
    pub session_id: Option<String>,
}

/// A normalized inbound message, platform specifics already stripped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub sender_id: String,
    pub display_name: String,
    pub platform: String,
    pub content: String,
    #[serde(default)]
    pub hints: FingerprintHints,
}

/// Result of handling one inbound message end to end.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundOutcome {
    /// Reply was generated and persisted; the caller delivers this content.
    Delivered { content: String },
    /// Reply is held for human review; surface the review reference.
    PendingPreview {
        preview_id: String,
        review_url: String,
    },
    /// Another process already claimed this message. Drop silently.
    DroppedDuplicate,
}

/// Process tier. Exactly one process is configured primary; it runs the
/// timeout scanner and owns the authoritative conversation cache. Role comes
/// from explicit configuration, never from runtime self-election.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum ProcessRole {
    Primary,
    Secondary,
}

impl ProcessRole {
    pub fn is_primary(self) -> bool {
        self == ProcessRole::Primary
    }
}

/// Outcome of an `acquire` call on the coordination store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// The key was free or expired; the caller now holds it.
    Granted,
    /// Held unexpired by another owner.
    AlreadyHeld { owner: String },
}

impl AcquireOutcome {
    pub fn is_granted(&self) -> bool {
        matches!(self, AcquireOutcome::Granted)
    }
}

/// Returns the current time as an RFC 3339 string with millisecond precision,
/// the timestamp format used everywhere in Greenroom.
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Generates a fresh opaque identifier (UUID v4).
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
