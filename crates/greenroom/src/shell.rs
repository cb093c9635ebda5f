// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `greenroom shell` command implementation.
//!
//! Launches an interactive REPL that drives the full inbound pipeline with
//! the loopback generator: dedup, conversation resolution, persistence, and
//! the preview workflow when enabled. `/confirm` and `/edit` resolve pending
//! previews from the prompt; a primary-role shell also runs the timeout
//! scanner so unconfirmed previews escalate live.

use std::sync::Arc;

use async_trait::async_trait;
use colored::Colorize;
use greenroom_config::model::GreenroomConfig;
use greenroom_conversation::ConversationManager;
use greenroom_coord::SqliteCoordStore;
use greenroom_core::{FingerprintHints, GreenroomError, InboundMessage, InboundOutcome, ReplyGenerator};
use greenroom_dedup::Deduplicator;
use greenroom_pipeline::Pipeline;
use greenroom_preview::{
    ConfirmCallback, PreviewCoordinator, PreviewDelivery, TimeoutScanner, run_scanner_loop,
};
use greenroom_storage::SqliteConversationStore;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio_util::sync::CancellationToken;

use crate::generator::LoopbackGenerator;

/// Prints resolved previews to the terminal in place of a platform adapter.
struct ShellDelivery;

#[async_trait]
impl ConfirmCallback for ShellDelivery {
    fn name(&self) -> &str {
        "shell"
    }

    async fn on_resolved(&self, delivery: &PreviewDelivery) -> Result<(), GreenroomError> {
        let tag = if delivery.is_timeout() {
            "timed out".yellow()
        } else {
            "confirmed".green()
        };
        println!("\n[{tag}] {}", delivery.content);
        Ok(())
    }
}

/// Runs the `greenroom shell` interactive REPL.
pub async fn run_shell(config: GreenroomConfig) -> Result<(), GreenroomError> {
    let instance_id = config.process.effective_instance_id();

    let coord = Arc::new(SqliteCoordStore::open(&config.coordination).await?);
    let store = Arc::new(SqliteConversationStore::open(&config.storage).await?);

    let generator: Arc<dyn ReplyGenerator> = Arc::new(LoopbackGenerator::new());
    let conversations = Arc::new(ConversationManager::new(
        store.clone(),
        coord.clone(),
        generator,
        config.process.role,
        &config.conversation,
    ));
    let dedup = Arc::new(Deduplicator::new(
        coord.clone(),
        config.dedup_window(),
        instance_id.clone(),
    ));

    let previews = if config.preview.enabled {
        let coordinator = Arc::new(PreviewCoordinator::new(
            coord.clone(),
            store.clone(),
            config.preview.clone(),
            config.preview_record_ttl(),
        ));
        coordinator
            .register_confirm_callback(Arc::new(ShellDelivery))
            .await;
        Some(coordinator)
    } else {
        None
    };

    let pipeline = Pipeline::new(dedup, conversations, previews.clone());

    // A primary shell runs the scanner so preview timeouts resolve live;
    // the lease keeps it from double-scanning alongside a serve host.
    let cancel = CancellationToken::new();
    let mut scanner_task = None;
    if config.process.role.is_primary() {
        if let Some(coordinator) = &previews {
            let scanner = Arc::new(TimeoutScanner::new(
                coord.clone(),
                coordinator.clone(),
                &config.preview,
                &instance_id,
            ));
            scanner_task = Some(tokio::spawn(run_scanner_loop(scanner, cancel.clone())));
        }
    }

    // Set up readline editor.
    let mut rl = DefaultEditor::new()
        .map_err(|e| GreenroomError::Internal(format!("failed to initialize readline: {e}")))?;

    // Print welcome message.
    println!("{}", "greenroom shell".bold().green());
    if previews.is_some() {
        println!(
            "Preview mode is on: resolve pending replies with {} or {}.",
            "/confirm <id>".yellow(),
            "/edit <id> <text>".yellow()
        );
    }
    println!("Type {} to exit.\n", "/quit".yellow());

    // REPL loop.
    let prompt = format!("{}> ", "greenroom".green());
    loop {
        match rl.readline(&prompt) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed == "/quit" || trimmed == "/exit" {
                    break;
                }
                if trimmed.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(&line);

                if let Some(command) = trimmed.strip_prefix('/') {
                    handle_command(command, previews.as_deref()).await;
                    continue;
                }

                match pipeline.handle_inbound(&shell_message(trimmed)).await {
                    Ok(InboundOutcome::Delivered { content }) => println!("{content}"),
                    Ok(InboundOutcome::PendingPreview {
                        preview_id,
                        review_url,
                    }) => {
                        println!(
                            "{}",
                            format!("preview {preview_id} pending ({review_url})").yellow()
                        );
                    }
                    Ok(InboundOutcome::DroppedDuplicate) => {
                        println!("{}", "(dropped as duplicate)".dimmed());
                    }
                    Err(e) => eprintln!("{}: {e}", "error".red()),
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C
                break;
            }
            Err(ReadlineError::Eof) => {
                // Ctrl+D
                break;
            }
            Err(e) => {
                eprintln!("{}: {e}", "error".red());
                break;
            }
        }
    }

    cancel.cancel();
    if let Some(task) = scanner_task {
        let _ = task.await;
    }

    store.close().await?;
    coord.close().await?;

    println!("{}", "goodbye".dimmed());
    Ok(())
}

/// Handles a `/command` line. Unknown commands print usage instead of
/// erroring out of the REPL.
async fn handle_command(command: &str, previews: Option<&PreviewCoordinator>) {
    let mut parts = command.splitn(3, ' ');
    let name = parts.next().unwrap_or("");

    let Some(previews) = previews else {
        println!("{}", "preview mode is off; no commands available".dimmed());
        return;
    };

    match name {
        "confirm" => {
            let Some(id) = parts.next() else {
                println!("usage: /confirm <preview-id>");
                return;
            };
            if let Err(e) = previews.confirm(id).await {
                eprintln!("{}: {e}", "error".red());
            }
        }
        "edit" => {
            let (Some(id), Some(text)) = (parts.next(), parts.next()) else {
                println!("usage: /edit <preview-id> <new text>");
                return;
            };
            match previews.edit_content(id, text).await {
                Ok(_) => println!("{}", format!("edited {id}").green()),
                Err(e) => eprintln!("{}: {e}", "error".red()),
            }
        }
        _ => println!("{}", format!("unknown command: /{name}").red()),
    }
}

/// A REPL line as a normalized inbound message on the `"cli"` platform.
fn shell_message(content: &str) -> InboundMessage {
    InboundMessage {
        sender_id: "local".to_string(),
        display_name: "local".to_string(),
        platform: "cli".to_string(),
        content: content.to_string(),
        hints: FingerprintHints::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_message_is_normalized() {
        let message = shell_message("hello");
        assert_eq!(message.platform, "cli");
        assert_eq!(message.sender_id, "local");
        assert!(message.hints.message_id.is_none());
    }
}
