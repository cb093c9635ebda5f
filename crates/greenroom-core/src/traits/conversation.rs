// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation store trait: the narrow durable-storage contract the core
//! requires. All operations are durable on return.

use async_trait::async_trait;

use crate::error::GreenroomError;
use crate::types::{Conversation, Message, NewMessage};

/// Durable relational storage for conversations and messages.
///
/// The store is append-only from the core's point of view: messages are never
/// updated or deleted, and conversations are never hard-deleted. Failures
/// surface as [`GreenroomError::StorageUnavailable`].
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Persists a freshly created conversation.
    async fn insert_conversation(&self, conversation: &Conversation)
    -> Result<(), GreenroomError>;

    /// Fetches a conversation by id.
    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, GreenroomError>;

    /// Returns the most recently active conversation for a (sender, platform)
    /// pair, if any.
    async fn find_latest_by_sender_platform(
        &self,
        sender_id: &str,
        platform: &str,
    ) -> Result<Option<Conversation>, GreenroomError>;

    /// Appends a message, assigning the next sequence number inside the
    /// store's own transaction so concurrent appenders from any process get
    /// strictly increasing, contiguous `seq` values. The same transaction
    /// bumps the conversation's message count and last-active timestamp.
    async fn insert_message(&self, new: NewMessage) -> Result<Message, GreenroomError>;

    /// Refreshes a conversation's last-active timestamp without appending.
    async fn update_activity(&self, conversation_id: &str) -> Result<(), GreenroomError>;

    /// Returns up to `limit` most recent messages in ascending `seq` order.
    async fn list_messages(
        &self,
        conversation_id: &str,
        limit: u32,
    ) -> Result<Vec<Message>, GreenroomError>;
}
