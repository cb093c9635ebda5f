// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! [`ConversationStore`] implementation over the local SQLite database.

use async_trait::async_trait;

use greenroom_config::model::StorageConfig;
use greenroom_core::{Conversation, ConversationStore, GreenroomError, Message, NewMessage};

use crate::database::Database;
use crate::queries;

/// Durable conversation store backed by one SQLite file per deployment.
pub struct SqliteConversationStore {
    db: Database,
}

impl SqliteConversationStore {
    /// Opens the database at the configured path, running migrations first.
    pub async fn open(config: &StorageConfig) -> Result<Self, GreenroomError> {
        let db = Database::open(&config.database_path, config.wal_mode).await?;
        Ok(Self { db })
    }

    /// Checkpoints the WAL ahead of process shutdown.
    pub async fn close(&self) -> Result<(), GreenroomError> {
        self.db.close().await
    }
}

#[async_trait]
impl ConversationStore for SqliteConversationStore {
    async fn insert_conversation(
        &self,
        conversation: &Conversation,
    ) -> Result<(), GreenroomError> {
        queries::conversations::insert_conversation(&self.db, conversation).await
    }

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, GreenroomError> {
        queries::conversations::get_conversation(&self.db, id).await
    }

    async fn find_latest_by_sender_platform(
        &self,
        sender_id: &str,
        platform: &str,
    ) -> Result<Option<Conversation>, GreenroomError> {
        queries::conversations::find_latest_by_sender_platform(&self.db, sender_id, platform).await
    }

    async fn insert_message(&self, new: NewMessage) -> Result<Message, GreenroomError> {
        queries::messages::insert_message(&self.db, new).await
    }

    async fn update_activity(&self, conversation_id: &str) -> Result<(), GreenroomError> {
        queries::conversations::update_activity(&self.db, conversation_id).await
    }

    async fn list_messages(
        &self,
        conversation_id: &str,
        limit: u32,
    ) -> Result<Vec<Message>, GreenroomError> {
        queries::messages::list_messages(&self.db, conversation_id, limit).await
    }
}
