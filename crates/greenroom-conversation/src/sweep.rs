// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic cache eviction, run on the primary only.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::manager::ConversationManager;

/// Runs the eviction sweep until cancelled. Eviction is local cache hygiene;
/// skipping a tick under load loses nothing durable.
pub async fn run_eviction_loop(
    manager: Arc<ConversationManager>,
    sweep_interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(sweep_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(
        interval_secs = sweep_interval.as_secs(),
        "cache eviction loop running"
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let evicted = manager.evict_expired();
                if evicted > 0 {
                    debug!(evicted, remaining = manager.cache_size(), "evicted expired conversations");
                }
            }
            _ = cancel.cancelled() => {
                info!("shutdown signal received, stopping eviction loop");
                break;
            }
        }
    }
}
