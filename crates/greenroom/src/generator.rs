// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Loopback reply generation for model-free local operation.

use async_trait::async_trait;
use futures::stream;
use greenroom_core::{GreenroomError, Message, ReplyGenerator, ReplyStream};

/// Echoes the inbound content back with a turn counter.
///
/// Stands in for a model backend so `serve` and `shell` run without external
/// services; a real deployment swaps in its own [`ReplyGenerator`].
pub struct LoopbackGenerator;

impl LoopbackGenerator {
    pub fn new() -> Self {
        Self
    }

    fn compose(history: &[Message], content: &str) -> String {
        // History excludes the message being answered, so a fresh
        // conversation is turn 1.
        let turn = history.len() / 2 + 1;
        format!("[turn {turn}] {content}")
    }
}

impl Default for LoopbackGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReplyGenerator for LoopbackGenerator {
    async fn generate(
        &self,
        history: &[Message],
        content: &str,
    ) -> Result<String, GreenroomError> {
        Ok(Self::compose(history, content))
    }

    async fn generate_stream(
        &self,
        history: &[Message],
        content: &str,
    ) -> Result<ReplyStream, GreenroomError> {
        let full = Self::compose(history, content);
        let chunks: Vec<Result<String, GreenroomError>> = full
            .split_inclusive(' ')
            .map(|part| Ok(part.to_string()))
            .collect();
        Ok(Box::pin(stream::iter(chunks)))
    }
}
