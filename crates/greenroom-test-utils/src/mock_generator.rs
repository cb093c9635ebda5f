// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock reply generator for deterministic testing.
//!
//! `MockGenerator` implements `ReplyGenerator` with pre-configured replies,
//! enabling fast, CI-runnable tests without an upstream model.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use greenroom_core::{GreenroomError, Message, ReplyGenerator, ReplyStream};

/// A mock generator that returns pre-configured replies.
///
/// Replies are popped from a FIFO queue. When the queue is empty, a default
/// "mock reply" text is returned.
pub struct MockGenerator {
    replies: Arc<Mutex<VecDeque<String>>>,
}

impl MockGenerator {
    /// Create a new mock generator with an empty reply queue.
    pub fn new() -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Create a mock generator pre-loaded with the given replies.
    pub fn with_replies(replies: Vec<String>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::from(replies))),
        }
    }

    /// Add a reply to the end of the queue.
    pub async fn add_reply(&self, text: String) {
        self.replies.lock().await.push_back(text);
    }

    /// Pop the next reply, or return the default.
    async fn next_reply(&self) -> String {
        self.replies
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| "mock reply".to_string())
    }
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReplyGenerator for MockGenerator {
    async fn generate(
        &self,
        _history: &[Message],
        _content: &str,
    ) -> Result<String, GreenroomError> {
        Ok(self.next_reply().await)
    }

    async fn generate_stream(
        &self,
        _history: &[Message],
        _content: &str,
    ) -> Result<ReplyStream, GreenroomError> {
        let reply = self.next_reply().await;
        let chunks = reply
            .split_inclusive(' ')
            .map(|chunk| Ok(chunk.to_string()))
            .collect::<Vec<_>>();
        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}
