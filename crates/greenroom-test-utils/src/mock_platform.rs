// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock platform adapter for deterministic testing.
//!
//! `MockPlatform` implements `PlatformAdapter`, capturing outbound deliveries
//! for assertion in tests.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use greenroom_core::{GreenroomError, PlatformAdapter};

/// One captured delivery: `(sender_id, content)`.
pub type Delivery = (String, String);

/// A mock platform that records every delivery instead of sending it.
pub struct MockPlatform {
    name: String,
    sent: Arc<Mutex<Vec<Delivery>>>,
}

impl MockPlatform {
    /// Create a mock platform named `"mock"`, the platform tag the harness
    /// uses for inbound messages.
    pub fn new() -> Self {
        Self::named("mock")
    }

    /// Create a mock platform with a custom platform tag.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// All deliveries captured so far, in order.
    pub async fn deliveries(&self) -> Vec<Delivery> {
        self.sent.lock().await.clone()
    }

    /// Number of deliveries captured so far.
    pub async fn delivery_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    /// Clear captured deliveries.
    pub async fn clear(&self) {
        self.sent.lock().await.clear();
    }
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlatformAdapter for MockPlatform {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, sender_id: &str, content: &str) -> Result<(), GreenroomError> {
        self.sent
            .lock()
            .await
            .push((sender_id.to_string(), content.to_string()));
        Ok(())
    }
}
