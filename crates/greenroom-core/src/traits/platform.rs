// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Platform adapter trait: the outbound half of the transport contract.

use async_trait::async_trait;

use crate::error::GreenroomError;

/// Pushes finally-confirmed content back to a platform.
///
/// One adapter per platform; the preview coordinator's confirm-callback
/// registry is the producer side of this contract. Inbound translation
/// (platform payload to [`InboundMessage`](crate::types::InboundMessage))
/// happens outside the core.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// Platform tag this adapter serves, e.g. `"web"` or `"telegram"`.
    fn name(&self) -> &str;

    /// Delivers `content` to `sender_id` on this platform.
    async fn deliver(&self, sender_id: &str, content: &str) -> Result<(), GreenroomError>;
}
