// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `greenroom serve` command implementation.
//!
//! Runs a long-lived worker process. The primary runs the preview timeout
//! scanner and the conversation cache eviction sweep; secondaries hold the
//! stores open and serve library traffic only. Inbound messages enter
//! through platform adapters in embedding processes, so this host's job is
//! the shared background duties. Supports graceful shutdown via signal
//! handlers.

use std::sync::Arc;
use std::time::Duration;

use greenroom_config::model::GreenroomConfig;
use greenroom_conversation::{ConversationManager, run_eviction_loop};
use greenroom_coord::SqliteCoordStore;
use greenroom_core::{GreenroomError, ReplyGenerator};
use greenroom_pipeline::install_signal_handler;
use greenroom_preview::{PreviewCoordinator, TimeoutScanner, run_scanner_loop};
use greenroom_storage::SqliteConversationStore;
use tracing::{error, info, warn};

use crate::generator::LoopbackGenerator;

/// Runs the `greenroom serve` command.
///
/// Opens the coordination and conversation stores, spawns the role-gated
/// background loops, and parks until a shutdown signal arrives.
pub async fn run_serve(config: GreenroomConfig) -> Result<(), GreenroomError> {
    // Initialize tracing subscriber.
    init_tracing(&config.process.log_level);
    log_allocator_stats();

    let instance_id = config.process.effective_instance_id();
    info!(
        role = %config.process.role,
        instance_id = %instance_id,
        "starting greenroom serve"
    );

    // Open the shared coordination store. Every worker in the deployment
    // must point at the same file.
    let coord = Arc::new(
        SqliteCoordStore::open(&config.coordination)
            .await
            .map_err(|e| {
                error!(error = %e, "failed to open coordination store");
                eprintln!(
                    "error: cannot open coordination database at {}. \
                     All worker processes must share one coordination file.",
                    config.coordination.database_path
                );
                e
            })?,
    );

    // Open the conversation store.
    let store = Arc::new(SqliteConversationStore::open(&config.storage).await?);

    // Reply generation is an embedding concern; the standalone host carries
    // the loopback generator so the manager can be constructed.
    let generator: Arc<dyn ReplyGenerator> = Arc::new(LoopbackGenerator::new());
    let conversations = Arc::new(ConversationManager::new(
        store.clone(),
        coord.clone(),
        generator,
        config.process.role,
        &config.conversation,
    ));

    let previews = if config.preview.enabled {
        let coordinator = Arc::new(PreviewCoordinator::new(
            coord.clone(),
            store.clone(),
            config.preview.clone(),
            config.preview_record_ttl(),
        ));
        warn!(
            "preview mode enabled with no platform delivery callbacks \
             registered in this host; resolutions persist and log only"
        );
        Some(coordinator)
    } else {
        info!("preview mode disabled; replies deliver immediately");
        None
    };

    // Install signal handler.
    let cancel = install_signal_handler();

    // Spawn primary-only background loops.
    let mut background = Vec::new();
    if config.process.role.is_primary() {
        if let Some(coordinator) = &previews {
            let scanner = Arc::new(TimeoutScanner::new(
                coord.clone(),
                coordinator.clone(),
                &config.preview,
                &instance_id,
            ));
            background.push(tokio::spawn(run_scanner_loop(scanner, cancel.clone())));
        }
        background.push(tokio::spawn(run_eviction_loop(
            conversations.clone(),
            Duration::from_secs(config.conversation.sweep_interval_secs),
            cancel.clone(),
        )));
        info!(tasks = background.len(), "primary background tasks started");
    } else {
        info!("secondary worker: no background loops");
    }

    cancel.cancelled().await;

    // Let the loops log their own shutdown before closing the stores.
    for task in background {
        let _ = task.await;
    }

    store.close().await?;
    coord.close().await?;

    info!("greenroom serve shutdown complete");
    Ok(())
}

/// Logs allocator stats once at startup so operators can confirm jemalloc
/// is active.
#[cfg(not(target_env = "msvc"))]
fn log_allocator_stats() {
    let _ = tikv_jemalloc_ctl::epoch::advance();
    let allocated = tikv_jemalloc_ctl::stats::allocated::read().unwrap_or(0);
    let resident = tikv_jemalloc_ctl::stats::resident::read().unwrap_or(0);
    info!(
        allocated_bytes = allocated,
        resident_bytes = resident,
        "jemalloc allocator active"
    );
}

#[cfg(target_env = "msvc")]
fn log_allocator_stats() {}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("greenroom={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
