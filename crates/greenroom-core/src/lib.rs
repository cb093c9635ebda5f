// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Greenroom coordination layer.
//!
//! This crate provides the foundational trait definitions, error types, and
//! common types used throughout the Greenroom workspace: the shared
//! coordination store contract, the durable conversation store contract, and
//! the reply-generator and platform-adapter collaborator traits.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::GreenroomError;
pub use types::{
    AcquireOutcome, Conversation, FingerprintHints, InboundMessage, InboundOutcome, Message,
    MessageRole, NewMessage, PreviewRequest, PreviewResolution, PreviewState, ProcessRole,
    new_id, now_rfc3339,
};

pub use traits::{
    ConversationStore, CoordinationStore, PlatformAdapter, ReplyGenerator, ReplyStream,
};

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn error_taxonomy_constructs() {
        let _config = GreenroomError::Config("test".into());
        let coord = GreenroomError::CoordinationUnavailable {
            source: Box::new(std::io::Error::other("db locked")),
        };
        let storage = GreenroomError::StorageUnavailable {
            source: Box::new(std::io::Error::other("disk full")),
        };
        let generation = GreenroomError::GenerationFailed {
            message: "upstream 500".into(),
            source: None,
        };
        let closed = GreenroomError::PreviewAlreadyClosed {
            preview_id: "p-1".into(),
        };

        assert!(coord.is_infrastructure());
        assert!(storage.is_infrastructure());
        assert!(generation.is_infrastructure());
        assert!(!closed.is_infrastructure());
    }

    #[test]
    fn error_messages_name_the_failure() {
        let err = GreenroomError::PreviewAlreadyClosed {
            preview_id: "p-42".into(),
        };
        assert_eq!(err.to_string(), "preview already closed: p-42");

        let err = GreenroomError::GenerationFailed {
            message: "timeout".into(),
            source: None,
        };
        assert_eq!(err.to_string(), "reply generation failed: timeout");
    }

    #[test]
    fn message_role_round_trips() {
        for role in [MessageRole::User, MessageRole::Assistant] {
            let s = role.to_string();
            let parsed = MessageRole::from_str(&s).expect("should parse back");
            assert_eq!(role, parsed);
        }
        assert_eq!(MessageRole::User.to_string(), "user");
        assert_eq!(MessageRole::Assistant.to_string(), "assistant");
    }

    #[test]
    fn preview_state_serializes_snake_case() {
        let json = serde_json::to_string(&PreviewState::PendingConfirmation)
            .expect("should serialize");
        assert_eq!(json, "\"pending_confirmation\"");
        let parsed: PreviewState =
            serde_json::from_str("\"timed_out\"").expect("should deserialize");
        assert_eq!(parsed, PreviewState::TimedOut);
    }

    #[test]
    fn process_role_parses_case_insensitive() {
        assert_eq!(
            ProcessRole::from_str("Primary").expect("should parse"),
            ProcessRole::Primary
        );
        assert_eq!(
            ProcessRole::from_str("secondary").expect("should parse"),
            ProcessRole::Secondary
        );
        assert!(ProcessRole::Primary.is_primary());
        assert!(!ProcessRole::Secondary.is_primary());
    }

    #[test]
    fn effective_content_prefers_edit() {
        let mut preview = PreviewRequest {
            id: new_id(),
            conversation_id: "c-1".into(),
            message_id: "m-1".into(),
            sender_id: "u1".into(),
            platform: "web".into(),
            original_content: "original".into(),
            edited_content: None,
            context: serde_json::json!({}),
            latency_ms: 12,
            state: PreviewState::PendingConfirmation,
            resolution: None,
            created_at: now_rfc3339(),
            updated_at: now_rfc3339(),
        };
        assert_eq!(preview.effective_content(), "original");

        preview.edited_content = Some("edited".into());
        assert_eq!(preview.effective_content(), "edited");
    }

    #[test]
    fn new_message_helpers_set_role_and_flag() {
        let user = NewMessage::user("c-1", "hi");
        assert_eq!(user.role, MessageRole::User);
        assert!(!user.is_timeout);

        let timed_out = NewMessage::assistant("c-1", "late reply", true);
        assert_eq!(timed_out.role, MessageRole::Assistant);
        assert!(timed_out.is_timeout);
    }

    #[test]
    fn timestamps_sort_lexicographically() {
        // The RFC 3339 millisecond format is fixed-width, so string order
        // matches time order. Expiry comparisons rely on this.
        let a = now_rfc3339();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let b = now_rfc3339();
        assert!(a < b);
        assert!(a.ends_with('Z'));
    }
}
