// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Async handle over the conversations SQLite file.
//!
//! Each process owns one `tokio_rusqlite` connection, which funnels all
//! statements through a dedicated blocking thread. Worker processes sharing a
//! deployment point at the same file; WAL mode and the busy timeout arbitrate
//! between their writers, and sequence assignment runs inside an immediate
//! transaction so it always sees the latest committed append.

use std::path::Path;

use greenroom_core::GreenroomError;
use tokio_rusqlite::Connection;

use crate::migrations::run_migrations;

/// How long a statement waits on another process's write transaction before
/// surfacing `StorageUnavailable`.
const BUSY_TIMEOUT_MS: u64 = 5000;

/// Maps a connection-level failure into the storage error that propagates
/// unmodified to the inbound boundary.
pub(crate) fn map_storage_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> GreenroomError {
    GreenroomError::StorageUnavailable { source: Box::new(e) }
}

fn open_err(e: impl std::error::Error + Send + Sync + 'static) -> GreenroomError {
    GreenroomError::StorageUnavailable { source: Box::new(e) }
}

/// Owned connection to the conversations database.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens (creating if necessary) the database at `path`, applies pending
    /// migrations, and configures the session pragmas.
    pub async fn open(path: &str, wal_mode: bool) -> Result<Self, GreenroomError> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(open_err)?;
        }

        // Migrations use refinery's blocking runner, so they get their own
        // short-lived synchronous connection off the async runtime.
        let migration_path = path.to_string();
        tokio::task::spawn_blocking(move || -> Result<(), GreenroomError> {
            let mut conn = rusqlite::Connection::open(&migration_path).map_err(open_err)?;
            run_migrations(&mut conn).map_err(open_err)?;
            Ok(())
        })
        .await
        .map_err(open_err)??;

        let conn = Connection::open(path).await.map_err(open_err)?;
        let journal = if wal_mode { "WAL" } else { "DELETE" };
        let pragmas = format!(
            "PRAGMA journal_mode = {journal};\n\
             PRAGMA busy_timeout = {BUSY_TIMEOUT_MS};\n\
             PRAGMA synchronous = NORMAL;\n\
             PRAGMA foreign_keys = ON;"
        );
        conn.call(move |c| c.execute_batch(&pragmas))
            .await
            .map_err(map_storage_err)?;

        tracing::debug!(path, wal_mode, "conversation database ready");
        Ok(Self { conn })
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Checkpoints the WAL ahead of process shutdown. Connection teardown is
    /// left to drop.
    pub async fn close(&self) -> Result<(), GreenroomError> {
        self.conn
            .call(|c| c.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);"))
            .await
            .map_err(map_storage_err)?;
        Ok(())
    }
}
