// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Timeout scanning for pending previews.
//!
//! One process at a time sweeps the `preview/` keyspace and resolves records
//! whose confirmation window has lapsed, delivering the original generated
//! content flagged as a timeout. The sweep runs under a coordination lease,
//! so a second process configured as primary by mistake skips cycles instead
//! of double-delivering. The first cycle runs immediately on startup, which
//! doubles as recovery for previews orphaned by a crash.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use greenroom_config::model::PreviewConfig;
use greenroom_core::{
    AcquireOutcome, CoordinationStore, GreenroomError, PreviewRequest, PreviewState,
};

use crate::coordinator::PreviewCoordinator;

/// Coordination key for the scan lease.
const SCANNER_LEASE_KEY: &str = "scanner/lease";

/// The lease survives this many missed cycles before another process may
/// take over scanning.
const LEASE_TICKS: u32 = 3;

/// Summary of one scan cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanOutcome {
    /// Previews resolved as timed out this cycle.
    pub timed_out: usize,
    /// Expired coordination entries physically removed.
    pub purged: usize,
}

/// Periodically resolves previews nobody confirmed in time.
pub struct TimeoutScanner {
    coord: Arc<dyn CoordinationStore>,
    coordinator: Arc<PreviewCoordinator>,
    timeout: Duration,
    scan_interval: Duration,
    instance_id: String,
}

impl TimeoutScanner {
    pub fn new(
        coord: Arc<dyn CoordinationStore>,
        coordinator: Arc<PreviewCoordinator>,
        config: &PreviewConfig,
        instance_id: &str,
    ) -> Self {
        Self {
            coord,
            coordinator,
            timeout: Duration::from_secs(config.timeout_secs),
            scan_interval: Duration::from_secs(config.scan_interval_secs),
            instance_id: instance_id.to_string(),
        }
    }

    pub fn scan_interval(&self) -> Duration {
        self.scan_interval
    }

    /// Execute one scan cycle.
    ///
    /// Takes (or renews) the scan lease, resolves every pending preview past
    /// its deadline, then purges expired coordination entries. A cycle that
    /// finds the lease held elsewhere does nothing and reports zeros.
    pub async fn execute_scan(&self) -> Result<ScanOutcome, GreenroomError> {
        let lease_ttl = self.scan_interval * LEASE_TICKS;
        match self
            .coord
            .acquire(SCANNER_LEASE_KEY, &self.instance_id, lease_ttl)
            .await?
        {
            AcquireOutcome::Granted => {}
            AcquireOutcome::AlreadyHeld { owner } => {
                warn!(
                    holder = %owner,
                    "scan lease held by another process, skipping cycle"
                );
                return Ok(ScanOutcome::default());
            }
        }

        let now = Utc::now();
        let mut timed_out = 0;
        for (key, raw) in self.coord.list_prefix("preview/").await? {
            let record: PreviewRequest = match serde_json::from_str(&raw) {
                Ok(record) => record,
                Err(e) => {
                    warn!(key, error = %e, "skipping unreadable preview record");
                    continue;
                }
            };
            if record.state != PreviewState::PendingConfirmation
                || !past_deadline(&record.created_at, self.timeout, now)
            {
                continue;
            }

            match self.coordinator.resolve_timed_out(&record.id).await {
                Ok(_) => timed_out += 1,
                // A confirmation landed between the listing and our swap.
                Err(GreenroomError::PreviewAlreadyClosed { .. })
                | Err(GreenroomError::PreviewNotFound { .. }) => {
                    debug!(preview_id = %record.id, "preview resolved elsewhere during scan");
                }
                Err(e) => {
                    warn!(
                        preview_id = %record.id,
                        error = %e,
                        "preview timeout resolution returned an error"
                    );
                }
            }
        }

        let purged = self.coord.purge_expired().await?;
        if timed_out > 0 || purged > 0 {
            info!(timed_out, purged, "scan cycle complete");
        }
        Ok(ScanOutcome { timed_out, purged })
    }
}

/// Whether a preview created at `created_at` has outlived `timeout` as of
/// `now`. An unreadable timestamp counts as lapsed so a damaged record
/// cannot pend forever.
fn past_deadline(created_at: &str, timeout: Duration, now: DateTime<Utc>) -> bool {
    let Ok(created) = DateTime::parse_from_rfc3339(created_at) else {
        warn!(created_at, "unparseable preview timestamp, treating as lapsed");
        return true;
    };
    let age = now.signed_duration_since(created.with_timezone(&Utc));
    match chrono::Duration::from_std(timeout) {
        Ok(window) => age > window,
        Err(_) => false,
    }
}

/// Drives [`TimeoutScanner::execute_scan`] on its configured interval until
/// cancelled. The first cycle fires immediately.
pub async fn run_scanner_loop(scanner: Arc<TimeoutScanner>, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(scanner.scan_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(interval = ?scanner.scan_interval(), "preview timeout scanner started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = scanner.execute_scan().await {
                    warn!(error = %e, "scan cycle failed");
                }
            }
            _ = cancel.cancelled() => {
                info!("preview timeout scanner stopping");
                break;
            }
        }
    }
}
