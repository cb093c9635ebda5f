// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stable dedup fingerprints for inbound messages.
//!
//! A fingerprint is a pure function of the message's identifying fields:
//! sender, platform, the platform-supplied message id when present, a
//! truncated digest of the content, and the session id when the adapter could
//! resolve one. Retried webhook deliveries of the same event therefore map to
//! the same fingerprint even when they arrive at different worker processes.

use greenroom_core::InboundMessage;
use sha2::{Digest, Sha256};

/// Hex characters of the content digest that enter the fingerprint. The
/// digest only has to separate messages within one sender's dedup window, so
/// 64 bits is plenty.
const CONTENT_DIGEST_LEN: usize = 16;

/// Unit separator between fields, so adjacent fields cannot be confused by
/// concatenation (`"ab" + "c"` vs `"a" + "bc"`).
const FIELD_SEP: [u8; 1] = [0x1f];

/// Computes the dedup fingerprint for an inbound message.
pub fn fingerprint(message: &InboundMessage) -> String {
    let content_digest = truncated_content_digest(&message.content);

    let mut hasher = Sha256::new();
    hasher.update(message.sender_id.as_bytes());
    hasher.update(FIELD_SEP);
    hasher.update(message.platform.as_bytes());
    hasher.update(FIELD_SEP);
    if let Some(message_id) = &message.hints.message_id {
        hasher.update(message_id.as_bytes());
    }
    hasher.update(FIELD_SEP);
    hasher.update(content_digest.as_bytes());
    hasher.update(FIELD_SEP);
    if let Some(session_id) = &message.hints.session_id {
        hasher.update(session_id.as_bytes());
    }
    hex::encode(hasher.finalize())
}

fn truncated_content_digest(content: &str) -> String {
    let mut digest = hex::encode(Sha256::digest(content.as_bytes()));
    digest.truncate(CONTENT_DIGEST_LEN);
    digest
}

#[cfg(test)]
mod tests {
    use super::*;
    use greenroom_core::FingerprintHints;

    fn message(content: &str) -> InboundMessage {
        InboundMessage {
            sender_id: "u1".to_string(),
            display_name: "Sam".to_string(),
            platform: "web".to_string(),
            content: content.to_string(),
            hints: FingerprintHints::default(),
        }
    }

    #[test]
    fn identical_messages_share_a_fingerprint() {
        assert_eq!(fingerprint(&message("hi")), fingerprint(&message("hi")));
    }

    #[test]
    fn display_name_is_not_an_identifying_field() {
        let mut renamed = message("hi");
        renamed.display_name = "Samantha".to_string();
        assert_eq!(fingerprint(&message("hi")), fingerprint(&renamed));
    }

    #[test]
    fn each_identifying_field_changes_the_fingerprint() {
        let base = message("hi");

        let mut other_sender = base.clone();
        other_sender.sender_id = "u2".to_string();
        let mut other_platform = base.clone();
        other_platform.platform = "telegram".to_string();
        let mut other_content = base.clone();
        other_content.content = "hi!".to_string();
        let mut with_message_id = base.clone();
        with_message_id.hints.message_id = Some("m-1".to_string());
        let mut with_session = base.clone();
        with_session.hints.session_id = Some("s-1".to_string());

        let fp = fingerprint(&base);
        for variant in [
            &other_sender,
            &other_platform,
            &other_content,
            &with_message_id,
            &with_session,
        ] {
            assert_ne!(fp, fingerprint(variant));
        }
    }

    #[test]
    fn field_boundaries_are_unambiguous() {
        let mut a = message("hi");
        a.sender_id = "ab".to_string();
        a.platform = "c".to_string();
        let mut b = message("hi");
        b.sender_id = "a".to_string();
        b.platform = "bc".to_string();
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn long_content_differing_only_at_the_tail_is_distinguished() {
        let prefix = "x".repeat(4096);
        let a = message(&format!("{prefix}a"));
        let b = message(&format!("{prefix}b"));
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn fingerprint_is_lowercase_hex() {
        let fp = fingerprint(&message("hi"));
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
