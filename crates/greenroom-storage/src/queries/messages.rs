// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queries against the `messages` table.
//!
//! Appends run inside an immediate transaction so the sequence number read
//! and the insert are a single unit under SQLite's write lock. A concurrent
//! appender in another process waits on the busy timeout and then computes
//! its sequence number against the committed state, which keeps `seq`
//! strictly increasing and contiguous per conversation.

use greenroom_core::{GreenroomError, Message, MessageRole, NewMessage, new_id, now_rfc3339};
use rusqlite::{TransactionBehavior, params};

use crate::database::{Database, map_storage_err};

const SELECT_COLUMNS: &str = "id, conversation_id, seq, role, content, is_timeout, created_at";

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let role_str: String = row.get(3)?;
    let role = role_str.parse::<MessageRole>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Message {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        seq: row.get(2)?,
        role,
        content: row.get(4)?,
        is_timeout: row.get(5)?,
        created_at: row.get(6)?,
    })
}

pub(crate) async fn insert_message(
    db: &Database,
    new: NewMessage,
) -> Result<Message, GreenroomError> {
    db.conn()
        .call(move |conn| {
            // Immediate so the MAX(seq) read below holds the write lock and
            // cannot observe the same value as a racing appender.
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let seq: i64 = tx.query_row(
                "SELECT COALESCE(MAX(seq), 0) + 1 FROM messages WHERE conversation_id = ?1",
                params![new.conversation_id],
                |row| row.get(0),
            )?;
            let id = new_id();
            let created_at = now_rfc3339();
            tx.execute(
                "INSERT INTO messages
                    (id, conversation_id, seq, role, content, is_timeout, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    id,
                    new.conversation_id,
                    seq,
                    new.role.to_string(),
                    new.content,
                    new.is_timeout,
                    created_at
                ],
            )?;
            tx.execute(
                "UPDATE conversations
                 SET message_count = message_count + 1, last_active_at = ?2
                 WHERE id = ?1",
                params![new.conversation_id, created_at],
            )?;
            tx.commit()?;
            Ok(Message {
                id,
                conversation_id: new.conversation_id,
                seq,
                role: new.role,
                content: new.content,
                is_timeout: new.is_timeout,
                created_at,
            })
        })
        .await
        .map_err(map_storage_err)
}

/// Returns up to `limit` most recent messages in ascending `seq` order.
pub(crate) async fn list_messages(
    db: &Database,
    conversation_id: &str,
    limit: u32,
) -> Result<Vec<Message>, GreenroomError> {
    let conversation_id = conversation_id.to_string();
    db.conn()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM
                    (SELECT {SELECT_COLUMNS} FROM messages
                     WHERE conversation_id = ?1
                     ORDER BY seq DESC
                     LIMIT ?2)
                 ORDER BY seq ASC"
            ))?;
            let rows = stmt.query_map(params![conversation_id, i64::from(limit)], row_to_message)?;
            rows.collect()
        })
        .await
        .map_err(map_storage_err)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::queries::conversations;
    use greenroom_core::Conversation;

    async fn setup_with_conversation() -> (tempfile::TempDir, Database, Conversation) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conv.db");
        let db = Database::open(path.to_str().unwrap(), true).await.unwrap();
        let now = now_rfc3339();
        let conv = Conversation {
            id: new_id(),
            sender_id: "u1".to_string(),
            display_name: "Sam".to_string(),
            platform: "web".to_string(),
            message_count: 0,
            created_at: now.clone(),
            last_active_at: now,
        };
        conversations::insert_conversation(&db, &conv).await.unwrap();
        (dir, db, conv)
    }

    #[tokio::test]
    async fn append_assigns_contiguous_seq_and_bumps_conversation() {
        let (_dir, db, conv) = setup_with_conversation().await;

        let first = insert_message(&db, NewMessage::user(&conv.id, "hi")).await.unwrap();
        let second = insert_message(&db, NewMessage::assistant(&conv.id, "hello", false))
            .await
            .unwrap();
        let third = insert_message(&db, NewMessage::user(&conv.id, "more")).await.unwrap();

        assert_eq!(first.seq, 1);
        assert_eq!(second.seq, 2);
        assert_eq!(third.seq, 3);
        assert_eq!(second.role, MessageRole::Assistant);

        let refreshed = conversations::get_conversation(&db, &conv.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(refreshed.message_count, 3);
        assert!(refreshed.last_active_at >= conv.last_active_at);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn list_returns_most_recent_in_ascending_order() {
        let (_dir, db, conv) = setup_with_conversation().await;
        for i in 1..=5 {
            insert_message(&db, NewMessage::user(&conv.id, format!("m{i}")))
                .await
                .unwrap();
        }

        let tail = list_messages(&db, &conv.id, 3).await.unwrap();
        let seqs: Vec<i64> = tail.iter().map(|m| m.seq).collect();
        assert_eq!(seqs, vec![3, 4, 5]);
        assert_eq!(tail[2].content, "m5");

        let all = list_messages(&db, &conv.id, 100).await.unwrap();
        assert_eq!(all.len(), 5);
        assert!(list_messages(&db, "missing", 10).await.unwrap().is_empty());
        db.close().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_appenders_never_gap_or_repeat() {
        let (dir, db, conv) = setup_with_conversation().await;
        let db_a = Arc::new(db);
        // Second process simulated by a second connection to the same file.
        let db_b = Arc::new(
            Database::open(dir.path().join("conv.db").to_str().unwrap(), true)
                .await
                .unwrap(),
        );

        let mut handles = Vec::new();
        for task in 0..4 {
            let db = if task % 2 == 0 { db_a.clone() } else { db_b.clone() };
            let conversation_id = conv.id.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..5 {
                    insert_message(&db, NewMessage::user(&conversation_id, format!("t{task}-{i}")))
                        .await
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let all = list_messages(&db_a, &conv.id, 100).await.unwrap();
        let seqs: Vec<i64> = all.iter().map(|m| m.seq).collect();
        assert_eq!(seqs, (1..=20).collect::<Vec<i64>>());

        let refreshed = conversations::get_conversation(&db_a, &conv.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(refreshed.message_count, 20);
    }
}
