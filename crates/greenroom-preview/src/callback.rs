// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Confirm-callback contract: how resolved previews reach their subscribers.

use async_trait::async_trait;

use greenroom_core::{GreenroomError, PreviewRequest, PreviewResolution};

/// What a resolution hands to each subscriber.
///
/// `content` is what must be delivered: the effective (possibly edited)
/// content for a confirmation, the original generated content for a timeout.
#[derive(Debug, Clone)]
pub struct PreviewDelivery {
    pub preview: PreviewRequest,
    pub content: String,
    pub resolution: PreviewResolution,
}

impl PreviewDelivery {
    pub fn is_timeout(&self) -> bool {
        self.resolution == PreviewResolution::TimedOut
    }
}

/// A subscriber notified when a preview resolves.
///
/// Callbacks are invoked at least once per resolution, in registration
/// order. One callback's error never prevents the others from running, and
/// no callback is retried automatically; the first error is logged and
/// surfaced to whoever triggered the resolution.
#[async_trait]
pub trait ConfirmCallback: Send + Sync {
    /// Stable name used in logs when this callback fails.
    fn name(&self) -> &str;

    async fn on_resolved(&self, delivery: &PreviewDelivery) -> Result<(), GreenroomError>;
}
