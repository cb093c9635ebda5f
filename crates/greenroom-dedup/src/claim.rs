// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Claiming fingerprints through the coordination store.
//!
//! A claim is an insert-if-absent on `dedup/<fingerprint>`; exactly one of
//! any number of concurrent claimants wins. The record carries a phase so
//! losers can tell a message that is still being handled from one that
//! already completed. There is no release on success: the TTL is the cleanup
//! mechanism, which keeps retried deliveries deduplicated even after the
//! original completed.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use greenroom_core::{CoordinationStore, GreenroomError, now_rfc3339};

/// Outcome of a dedup claim attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// This process now owns the fingerprint; proceed with the message.
    Claimed,
    /// Another process already completed this fingerprint within the window.
    Duplicate,
    /// Another process is still handling this fingerprint.
    InProgress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ClaimPhase {
    Processing,
    Done,
}

/// JSON value stored under `dedup/<fingerprint>`.
#[derive(Debug, Serialize, Deserialize)]
struct ClaimRecord {
    phase: ClaimPhase,
    owner: String,
    claimed_at: String,
}

/// Cross-process message deduplicator.
pub struct Deduplicator {
    coord: Arc<dyn CoordinationStore>,
    window: Duration,
    instance_id: String,
}

impl Deduplicator {
    /// `window` should be the preview timeout plus the configured safety
    /// margin (see `GreenroomConfig::dedup_window`), so webhook retries that
    /// arrive after a slow preview cycle still read as duplicates.
    pub fn new(
        coord: Arc<dyn CoordinationStore>,
        window: Duration,
        instance_id: impl Into<String>,
    ) -> Self {
        Self {
            coord,
            window,
            instance_id: instance_id.into(),
        }
    }

    fn key(fingerprint: &str) -> String {
        format!("dedup/{fingerprint}")
    }

    /// Attempts to claim a fingerprint for this process.
    ///
    /// Exactly one of any set of concurrent callers with the same fingerprint
    /// gets [`ClaimOutcome::Claimed`]; the rest learn whether the winner is
    /// still working or already done. Coordination failures propagate; the
    /// caller must treat them as "cannot guarantee exclusivity" and drop the
    /// message rather than risk double-processing.
    pub async fn try_claim(&self, fingerprint: &str) -> Result<ClaimOutcome, GreenroomError> {
        let key = Self::key(fingerprint);
        let record = ClaimRecord {
            phase: ClaimPhase::Processing,
            owner: self.instance_id.clone(),
            claimed_at: now_rfc3339(),
        };
        let payload = serde_json::to_string(&record)
            .map_err(|e| GreenroomError::Internal(format!("claim record serialization: {e}")))?;

        // Two rounds cover the claim expiring between a lost swap and the
        // read; a message whose window elapsed mid-race is new work.
        for _ in 0..2 {
            if self
                .coord
                .compare_and_swap(&key, None, &payload, self.window)
                .await?
            {
                debug!(fingerprint, "fingerprint claimed");
                return Ok(ClaimOutcome::Claimed);
            }

            match self.coord.get(&key).await? {
                Some(raw) => {
                    let outcome = match serde_json::from_str::<ClaimRecord>(&raw) {
                        Ok(holder) if holder.phase == ClaimPhase::Processing => {
                            ClaimOutcome::InProgress
                        }
                        Ok(_) => ClaimOutcome::Duplicate,
                        Err(e) => {
                            warn!(fingerprint, error = %e, "unparseable claim record");
                            ClaimOutcome::Duplicate
                        }
                    };
                    debug!(fingerprint, ?outcome, "fingerprint already claimed");
                    return Ok(outcome);
                }
                None => continue,
            }
        }

        // Could not observe a stable state; prefer dropping over reprocessing.
        Ok(ClaimOutcome::Duplicate)
    }

    /// Flips this process's claim to `done`, so later retries read as
    /// duplicates rather than in-progress. Re-arms the record for a full
    /// window. Best-effort: losing the swap only affects the reported label,
    /// never correctness.
    pub async fn mark_completed(&self, fingerprint: &str) -> Result<(), GreenroomError> {
        let key = Self::key(fingerprint);
        let Some(raw) = self.coord.get(&key).await? else {
            return Ok(());
        };
        let Ok(mut record) = serde_json::from_str::<ClaimRecord>(&raw) else {
            warn!(fingerprint, "unparseable claim record, leaving it alone");
            return Ok(());
        };
        if record.phase == ClaimPhase::Done {
            return Ok(());
        }

        record.phase = ClaimPhase::Done;
        let updated = serde_json::to_string(&record)
            .map_err(|e| GreenroomError::Internal(format!("claim record serialization: {e}")))?;
        if !self
            .coord
            .compare_and_swap(&key, Some(raw.as_str()), &updated, self.window)
            .await?
        {
            debug!(fingerprint, "claim record changed underneath, leaving it alone");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use greenroom_config::model::CoordinationConfig;
    use greenroom_coord::SqliteCoordStore;

    async fn open_coord(dir: &tempfile::TempDir) -> Arc<dyn CoordinationStore> {
        let config = CoordinationConfig {
            database_path: dir.path().join("coord.db").to_string_lossy().into_owned(),
            busy_timeout_ms: 5000,
        };
        Arc::new(SqliteCoordStore::open(&config).await.unwrap())
    }

    #[tokio::test]
    async fn claim_then_in_progress_then_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let coord = open_coord(&dir).await;
        let worker_a = Deduplicator::new(coord.clone(), Duration::from_secs(30), "worker-a");
        let worker_b = Deduplicator::new(coord, Duration::from_secs(30), "worker-b");

        assert_eq!(worker_a.try_claim("fp-1").await.unwrap(), ClaimOutcome::Claimed);
        assert_eq!(
            worker_b.try_claim("fp-1").await.unwrap(),
            ClaimOutcome::InProgress
        );

        worker_a.mark_completed("fp-1").await.unwrap();
        assert_eq!(
            worker_b.try_claim("fp-1").await.unwrap(),
            ClaimOutcome::Duplicate
        );
    }

    #[tokio::test]
    async fn expired_claim_is_new_work() {
        let dir = tempfile::tempdir().unwrap();
        let coord = open_coord(&dir).await;
        let dedup = Deduplicator::new(coord, Duration::from_millis(80), "worker-a");

        assert_eq!(dedup.try_claim("fp-1").await.unwrap(), ClaimOutcome::Claimed);
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(dedup.try_claim("fp-1").await.unwrap(), ClaimOutcome::Claimed);
    }

    #[tokio::test]
    async fn mark_completed_after_expiry_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let coord = open_coord(&dir).await;
        let dedup = Deduplicator::new(coord, Duration::from_millis(80), "worker-a");

        assert_eq!(dedup.try_claim("fp-1").await.unwrap(), ClaimOutcome::Claimed);
        tokio::time::sleep(Duration::from_millis(150)).await;
        dedup.mark_completed("fp-1").await.unwrap();
        assert_eq!(dedup.try_claim("fp-1").await.unwrap(), ClaimOutcome::Claimed);
    }

    #[tokio::test]
    async fn completion_rearms_the_window() {
        let dir = tempfile::tempdir().unwrap();
        let coord = open_coord(&dir).await;
        let dedup = Deduplicator::new(coord, Duration::from_millis(400), "worker-a");

        assert_eq!(dedup.try_claim("fp-1").await.unwrap(), ClaimOutcome::Claimed);
        tokio::time::sleep(Duration::from_millis(250)).await;
        dedup.mark_completed("fp-1").await.unwrap();

        // Past the original deadline but within the re-armed window.
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(
            dedup.try_claim("fp-1").await.unwrap(),
            ClaimOutcome::Duplicate
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_claims_have_exactly_one_winner() {
        let dir = tempfile::tempdir().unwrap();
        let coord = open_coord(&dir).await;

        let mut handles = Vec::new();
        for i in 0..8 {
            let dedup =
                Deduplicator::new(coord.clone(), Duration::from_secs(30), format!("worker-{i}"));
            handles.push(tokio::spawn(
                async move { dedup.try_claim("fp-race").await.unwrap() },
            ));
        }

        let mut claimed = 0;
        for handle in handles {
            match handle.await.unwrap() {
                ClaimOutcome::Claimed => claimed += 1,
                ClaimOutcome::InProgress => {}
                ClaimOutcome::Duplicate => panic!("no claimant completed, duplicate is impossible"),
            }
        }
        assert_eq!(claimed, 1, "exactly one concurrent claim must win");
    }
}
