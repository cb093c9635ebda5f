// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The coordination entry table and its atomic primitives.
//!
//! One row per key: `(key, value, owner, expires_at)`. Claims taken through
//! [`CoordinationStore::acquire`] carry an owner; plain values do not. Expired
//! rows behave as absent everywhere and are physically removed by
//! [`CoordinationStore::purge_expired`].

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use greenroom_config::model::CoordinationConfig;
use greenroom_core::{AcquireOutcome, CoordinationStore, GreenroomError};

/// SQL expression for the database's current time, in the same fixed-width
/// RFC 3339 millisecond format used for `expires_at`, so lexicographic
/// comparison is time comparison.
const SQL_NOW: &str = "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";

/// Convert a tokio-rusqlite error into GreenroomError::CoordinationUnavailable.
fn map_coord_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> GreenroomError {
    GreenroomError::CoordinationUnavailable {
        source: Box::new(e),
    }
}

/// Render a TTL as a SQLite datetime modifier, e.g. `+330.000 seconds`.
/// Fractional seconds keep sub-second TTLs testable.
fn ttl_modifier(ttl: Duration) -> String {
    format!("{:+.3} seconds", ttl.as_secs_f64())
}

/// Shared coordination store backed by one SQLite file.
///
/// All worker processes open the same path. Mutations are single upsert or
/// guarded-update statements, so SQLite's write serialization makes them
/// atomic across processes; the configured busy timeout bounds how long one
/// process waits on another's write before the operation surfaces
/// [`GreenroomError::CoordinationUnavailable`].
pub struct SqliteCoordStore {
    conn: tokio_rusqlite::Connection,
}

impl SqliteCoordStore {
    /// Open (creating if needed) the coordination database at the configured
    /// path, apply pragmas, and ensure the entry table exists.
    pub async fn open(config: &CoordinationConfig) -> Result<Self, GreenroomError> {
        let conn = tokio_rusqlite::Connection::open(&config.database_path)
            .await
            .map_err(|e| GreenroomError::CoordinationUnavailable {
                source: Box::new(e),
            })?;

        let busy_timeout_ms = config.busy_timeout_ms;
        conn.call(move |conn| -> Result<(), rusqlite::Error> {
            // execute_batch tolerates the rows PRAGMA statements return.
            conn.execute_batch(&format!(
                "PRAGMA journal_mode = WAL;
                 PRAGMA busy_timeout = {busy_timeout_ms};
                 PRAGMA synchronous = NORMAL;"
            ))?;
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS coord_entries (
                    key TEXT PRIMARY KEY NOT NULL,
                    value TEXT NOT NULL DEFAULT '',
                    owner TEXT,
                    expires_at TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_coord_expires ON coord_entries(expires_at);",
            )?;
            Ok(())
        })
        .await
        .map_err(map_coord_err)?;

        debug!(path = %config.database_path, "coordination store opened");
        Ok(Self { conn })
    }

    /// Checkpoint the WAL ahead of process shutdown.
    pub async fn close(&self) -> Result<(), GreenroomError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_coord_err)?;
        debug!("coordination store WAL checkpoint complete");
        Ok(())
    }
}

#[async_trait]
impl CoordinationStore for SqliteCoordStore {
    async fn acquire(
        &self,
        key: &str,
        owner: &str,
        ttl: Duration,
    ) -> Result<AcquireOutcome, GreenroomError> {
        let key = key.to_string();
        let owner = owner.to_string();
        let modifier = ttl_modifier(ttl);

        self.conn
            .call(move |conn| -> Result<AcquireOutcome, rusqlite::Error> {
                let tx = conn.transaction()?;
                // The upsert only lands when the key is free, expired, or
                // already ours (lease renewal). Zero changed rows means a
                // live claim by someone else.
                let granted = tx.execute(
                    &format!(
                        "INSERT INTO coord_entries (key, value, owner, expires_at)
                         VALUES (?1, '', ?2, strftime('%Y-%m-%dT%H:%M:%fZ', 'now', ?3))
                         ON CONFLICT(key) DO UPDATE SET
                             value = excluded.value,
                             owner = excluded.owner,
                             expires_at = excluded.expires_at
                         WHERE coord_entries.owner IS excluded.owner
                            OR coord_entries.expires_at <= {SQL_NOW}"
                    ),
                    rusqlite::params![key, owner, modifier],
                )? > 0;

                let outcome = if granted {
                    AcquireOutcome::Granted
                } else {
                    let holder: Option<String> = tx.query_row(
                        "SELECT owner FROM coord_entries WHERE key = ?1",
                        rusqlite::params![key],
                        |row| row.get(0),
                    )?;
                    AcquireOutcome::AlreadyHeld {
                        owner: holder.unwrap_or_else(|| "unknown".to_string()),
                    }
                };
                tx.commit()?;
                Ok(outcome)
            })
            .await
            .map_err(map_coord_err)
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), GreenroomError> {
        let key = key.to_string();
        let value = value.to_string();
        let modifier = ttl_modifier(ttl);

        self.conn
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "INSERT INTO coord_entries (key, value, owner, expires_at)
                     VALUES (?1, ?2, NULL, strftime('%Y-%m-%dT%H:%M:%fZ', 'now', ?3))
                     ON CONFLICT(key) DO UPDATE SET
                         value = excluded.value,
                         owner = NULL,
                         expires_at = excluded.expires_at",
                    rusqlite::params![key, value, modifier],
                )?;
                Ok(())
            })
            .await
            .map_err(map_coord_err)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, GreenroomError> {
        let key = key.to_string();

        self.conn
            .call(move |conn| -> Result<Option<String>, rusqlite::Error> {
                let result = conn.query_row(
                    &format!(
                        "SELECT value FROM coord_entries
                         WHERE key = ?1 AND expires_at > {SQL_NOW}"
                    ),
                    rusqlite::params![key],
                    |row| row.get(0),
                );
                match result {
                    Ok(value) => Ok(Some(value)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e),
                }
            })
            .await
            .map_err(map_coord_err)
    }

    async fn delete(&self, key: &str) -> Result<(), GreenroomError> {
        let key = key.to_string();

        self.conn
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "DELETE FROM coord_entries WHERE key = ?1",
                    rusqlite::params![key],
                )?;
                Ok(())
            })
            .await
            .map_err(map_coord_err)
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: &str,
        ttl: Duration,
    ) -> Result<bool, GreenroomError> {
        let key = key.to_string();
        let expected = expected.map(str::to_string);
        let new = new.to_string();
        let modifier = ttl_modifier(ttl);

        self.conn
            .call(move |conn| -> Result<bool, rusqlite::Error> {
                let changed = match expected {
                    // Insert-if-absent: wins only when no live row exists.
                    None => conn.execute(
                        &format!(
                            "INSERT INTO coord_entries (key, value, owner, expires_at)
                             VALUES (?1, ?2, NULL, strftime('%Y-%m-%dT%H:%M:%fZ', 'now', ?3))
                             ON CONFLICT(key) DO UPDATE SET
                                 value = excluded.value,
                                 owner = NULL,
                                 expires_at = excluded.expires_at
                             WHERE coord_entries.expires_at <= {SQL_NOW}"
                        ),
                        rusqlite::params![key, new, modifier],
                    )?,
                    // Guarded update: wins only when the live value matches.
                    Some(expected) => conn.execute(
                        &format!(
                            "UPDATE coord_entries
                             SET value = ?3,
                                 expires_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now', ?4)
                             WHERE key = ?1 AND value = ?2
                               AND expires_at > {SQL_NOW}"
                        ),
                        rusqlite::params![key, expected, new, modifier],
                    )?,
                };
                Ok(changed > 0)
            })
            .await
            .map_err(map_coord_err)
    }

    async fn list_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>, GreenroomError> {
        let pattern = format!("{prefix}%");

        self.conn
            .call(move |conn| -> Result<Vec<(String, String)>, rusqlite::Error> {
                let mut stmt = conn.prepare(&format!(
                    "SELECT key, value FROM coord_entries
                     WHERE key LIKE ?1 AND expires_at > {SQL_NOW}
                     ORDER BY key"
                ))?;
                let entries = stmt
                    .query_map(rusqlite::params![pattern], |row| {
                        Ok((row.get(0)?, row.get(1)?))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(entries)
            })
            .await
            .map_err(map_coord_err)
    }

    /// Rows past `expires_at` are invisible to every read already; dropping
    /// them only keeps the file small.
    async fn purge_expired(&self) -> Result<usize, GreenroomError> {
        let purged = self
            .conn
            .call(move |conn| -> Result<usize, rusqlite::Error> {
                conn.execute(
                    &format!("DELETE FROM coord_entries WHERE expires_at <= {SQL_NOW}"),
                    [],
                )
            })
            .await
            .map_err(map_coord_err)?;
        if purged > 0 {
            debug!(purged, "purged expired coordination entries");
        }
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    fn config_for(path: &std::path::Path) -> CoordinationConfig {
        CoordinationConfig {
            database_path: path.to_string_lossy().into_owned(),
            busy_timeout_ms: 5000,
        }
    }

    async fn open_store(path: &std::path::Path) -> SqliteCoordStore {
        SqliteCoordStore::open(&config_for(path)).await.unwrap()
    }

    #[tokio::test]
    async fn acquire_grants_then_rejects_other_owner() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir.path().join("coord.db")).await;

        let first = store
            .acquire("scanner/lease", "worker-a", Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(first, AcquireOutcome::Granted);

        let second = store
            .acquire("scanner/lease", "worker-b", Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(
            second,
            AcquireOutcome::AlreadyHeld {
                owner: "worker-a".to_string()
            }
        );
    }

    #[tokio::test]
    async fn acquire_same_owner_renews_lease() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir.path().join("coord.db")).await;

        assert!(store
            .acquire("scanner/lease", "worker-a", Duration::from_millis(100))
            .await
            .unwrap()
            .is_granted());
        assert!(store
            .acquire("scanner/lease", "worker-a", Duration::from_secs(30))
            .await
            .unwrap()
            .is_granted());

        // The renewal extended the lease well past the original 100ms.
        tokio::time::sleep(Duration::from_millis(150)).await;
        let other = store
            .acquire("scanner/lease", "worker-b", Duration::from_secs(30))
            .await
            .unwrap();
        assert!(!other.is_granted());
    }

    #[tokio::test]
    async fn expired_claim_can_be_reacquired() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir.path().join("coord.db")).await;

        assert!(store
            .acquire("scanner/lease", "worker-a", Duration::from_millis(80))
            .await
            .unwrap()
            .is_granted());

        tokio::time::sleep(Duration::from_millis(150)).await;

        let outcome = store
            .acquire("scanner/lease", "worker-b", Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(outcome, AcquireOutcome::Granted);
    }

    #[tokio::test]
    async fn put_get_delete_round_trip() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir.path().join("coord.db")).await;

        store
            .put("conv/web/u1", "c-123", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(
            store.get("conv/web/u1").await.unwrap(),
            Some("c-123".to_string())
        );

        store.delete("conv/web/u1").await.unwrap();
        assert_eq!(store.get("conv/web/u1").await.unwrap(), None);

        // Deleting an absent key is not an error.
        store.delete("conv/web/u1").await.unwrap();
    }

    #[tokio::test]
    async fn get_on_expired_key_behaves_as_absent() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir.path().join("coord.db")).await;

        store
            .put("conv/web/u1", "c-123", Duration::from_millis(80))
            .await
            .unwrap();
        assert!(store.get("conv/web/u1").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(store.get("conv/web/u1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn cas_insert_if_absent_wins_once() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir.path().join("coord.db")).await;

        let first = store
            .compare_and_swap("dedup/abc", None, "claim-1", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(first);

        let second = store
            .compare_and_swap("dedup/abc", None, "claim-2", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(!second);
        assert_eq!(
            store.get("dedup/abc").await.unwrap(),
            Some("claim-1".to_string())
        );
    }

    #[tokio::test]
    async fn cas_insert_if_absent_wins_over_expired_row() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir.path().join("coord.db")).await;

        assert!(store
            .compare_and_swap("dedup/abc", None, "claim-1", Duration::from_millis(80))
            .await
            .unwrap());
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(store
            .compare_and_swap("dedup/abc", None, "claim-2", Duration::from_secs(60))
            .await
            .unwrap());
        assert_eq!(
            store.get("dedup/abc").await.unwrap(),
            Some("claim-2".to_string())
        );
    }

    #[tokio::test]
    async fn cas_guarded_update_requires_expected_value() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir.path().join("coord.db")).await;

        store
            .put("preview/p1", "pending", Duration::from_secs(60))
            .await
            .unwrap();

        // Wrong expected value loses.
        assert!(!store
            .compare_and_swap("preview/p1", Some("confirmed"), "closed", Duration::from_secs(60))
            .await
            .unwrap());

        // Matching expected value wins exactly once.
        assert!(store
            .compare_and_swap("preview/p1", Some("pending"), "confirmed", Duration::from_secs(60))
            .await
            .unwrap());
        assert!(!store
            .compare_and_swap("preview/p1", Some("pending"), "timed_out", Duration::from_secs(60))
            .await
            .unwrap());

        assert_eq!(
            store.get("preview/p1").await.unwrap(),
            Some("confirmed".to_string())
        );
    }

    #[tokio::test]
    async fn list_prefix_skips_expired_and_foreign_keys() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir.path().join("coord.db")).await;

        store
            .put("preview/p1", "a", Duration::from_secs(60))
            .await
            .unwrap();
        store
            .put("preview/p2", "b", Duration::from_millis(80))
            .await
            .unwrap();
        store
            .put("dedup/x", "c", Duration::from_secs(60))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;

        let entries = store.list_prefix("preview/").await.unwrap();
        assert_eq!(entries, vec![("preview/p1".to_string(), "a".to_string())]);
    }

    #[tokio::test]
    async fn purge_expired_removes_only_dead_rows() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir.path().join("coord.db")).await;

        store
            .put("a", "1", Duration::from_millis(80))
            .await
            .unwrap();
        store.put("b", "2", Duration::from_secs(60)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;
        let purged = store.purge_expired().await.unwrap();
        assert_eq!(purged, 1);
        assert_eq!(store.get("b").await.unwrap(), Some("2".to_string()));
    }

    #[tokio::test]
    async fn two_handles_on_one_file_share_state() {
        // Two store handles on the same path stand in for two processes.
        let dir = tempdir().unwrap();
        let path = dir.path().join("coord.db");
        let store_a = open_store(&path).await;
        let store_b = open_store(&path).await;

        assert!(store_a
            .acquire("scanner/lease", "proc-a", Duration::from_secs(30))
            .await
            .unwrap()
            .is_granted());
        assert!(!store_b
            .acquire("scanner/lease", "proc-b", Duration::from_secs(30))
            .await
            .unwrap()
            .is_granted());

        store_b
            .put("conv/web/u9", "c-9", Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(
            store_a.get("conv/web/u9").await.unwrap(),
            Some("c-9".to_string())
        );
    }

    #[tokio::test]
    async fn concurrent_cas_claims_exactly_one_winner() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("coord.db");

        let mut handles = Vec::new();
        for i in 0..8 {
            let path = path.clone();
            handles.push(tokio::spawn(async move {
                let store = open_store(&path).await;
                store
                    .compare_and_swap(
                        "dedup/race",
                        None,
                        &format!("claim-{i}"),
                        Duration::from_secs(60),
                    )
                    .await
                    .unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1, "exactly one concurrent claim must win");
    }
}
