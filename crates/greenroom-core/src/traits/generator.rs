// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reply generator trait: the external model-inference collaborator.

use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::error::GreenroomError;
use crate::types::Message;

/// Incremental reply output. Chunks concatenate to the full reply text.
pub type ReplyStream = Pin<Box<dyn Stream<Item = Result<String, GreenroomError>> + Send>>;

/// Produces a reply to `content` given the conversation history so far.
///
/// Generation may be long-running; callers must not hold any lock across a
/// call. Failures surface as [`GreenroomError::GenerationFailed`] and are
/// never retried by the core.
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    /// Generates the full reply in one call.
    async fn generate(&self, history: &[Message], content: &str)
    -> Result<String, GreenroomError>;

    /// Generates the reply as an incremental stream of chunks.
    async fn generate_stream(
        &self,
        history: &[Message],
        content: &str,
    ) -> Result<ReplyStream, GreenroomError>;
}
