// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bridges platform adapters into the preview confirm-callback registry.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use greenroom_core::{GreenroomError, PlatformAdapter};
use greenroom_preview::{ConfirmCallback, PreviewDelivery};

/// Delivers resolved preview content through one platform adapter.
///
/// Register one of these per adapter; each ignores previews for other
/// platforms, so the callback registry fans out correctly in a multi-platform
/// deployment. Delivery failures propagate to the coordinator, which logs
/// them and keeps going; redelivery is the platform's own retry concern.
pub struct PlatformDeliveryCallback {
    adapter: Arc<dyn PlatformAdapter>,
}

impl PlatformDeliveryCallback {
    pub fn new(adapter: Arc<dyn PlatformAdapter>) -> Self {
        Self { adapter }
    }
}

#[async_trait]
impl ConfirmCallback for PlatformDeliveryCallback {
    fn name(&self) -> &str {
        self.adapter.name()
    }

    async fn on_resolved(&self, delivery: &PreviewDelivery) -> Result<(), GreenroomError> {
        if delivery.preview.platform != self.adapter.name() {
            debug!(
                preview_id = %delivery.preview.id,
                platform = %delivery.preview.platform,
                adapter = self.adapter.name(),
                "preview belongs to another platform, skipping"
            );
            return Ok(());
        }

        self.adapter
            .deliver(&delivery.preview.sender_id, &delivery.content)
            .await?;
        info!(
            preview_id = %delivery.preview.id,
            sender_id = %delivery.preview.sender_id,
            platform = %delivery.preview.platform,
            is_timeout = delivery.is_timeout(),
            "preview content delivered"
        );
        Ok(())
    }
}
