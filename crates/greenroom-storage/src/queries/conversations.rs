// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queries against the `conversations` table.

use greenroom_core::{Conversation, GreenroomError};
use rusqlite::params;

use crate::database::{Database, map_storage_err};

const SELECT_COLUMNS: &str =
    "id, sender_id, display_name, platform, message_count, created_at, last_active_at";

fn row_to_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        display_name: row.get(2)?,
        platform: row.get(3)?,
        message_count: row.get(4)?,
        created_at: row.get(5)?,
        last_active_at: row.get(6)?,
    })
}

pub(crate) async fn insert_conversation(
    db: &Database,
    conversation: &Conversation,
) -> Result<(), GreenroomError> {
    let c = conversation.clone();
    db.conn()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO conversations
                    (id, sender_id, display_name, platform, message_count, created_at, last_active_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    c.id,
                    c.sender_id,
                    c.display_name,
                    c.platform,
                    c.message_count,
                    c.created_at,
                    c.last_active_at
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_storage_err)
}

pub(crate) async fn get_conversation(
    db: &Database,
    id: &str,
) -> Result<Option<Conversation>, GreenroomError> {
    let id = id.to_string();
    db.conn()
        .call(move |conn| {
            let result = conn.query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM conversations WHERE id = ?1"),
                params![id],
                row_to_conversation,
            );
            match result {
                Ok(conversation) => Ok(Some(conversation)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_storage_err)
}

pub(crate) async fn find_latest_by_sender_platform(
    db: &Database,
    sender_id: &str,
    platform: &str,
) -> Result<Option<Conversation>, GreenroomError> {
    let sender_id = sender_id.to_string();
    let platform = platform.to_string();
    db.conn()
        .call(move |conn| {
            let result = conn.query_row(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM conversations
                     WHERE sender_id = ?1 AND platform = ?2
                     ORDER BY last_active_at DESC
                     LIMIT 1"
                ),
                params![sender_id, platform],
                row_to_conversation,
            );
            match result {
                Ok(conversation) => Ok(Some(conversation)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_storage_err)
}

/// Refreshes `last_active_at` to the database clock's now.
pub(crate) async fn update_activity(db: &Database, id: &str) -> Result<(), GreenroomError> {
    let id = id.to_string();
    db.conn()
        .call(move |conn| {
            conn.execute(
                "UPDATE conversations
                 SET last_active_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_storage_err)
}
