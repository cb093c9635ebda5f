// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The preview coordinator.
//!
//! Preview records live in the coordination store as JSON values under
//! `preview/<id>`, so every worker process sees the same state. All state
//! transitions are compare-and-swaps against the exact record text last
//! read; that is what arbitrates a racing human confirmation against a
//! racing timeout scan, letting exactly one resolution path run callbacks
//! and persist the assistant message.
//!
//! Record TTL outlives the preview timeout by the dedup safety margin, so a
//! late confirm still gets `PreviewAlreadyClosed` rather than "not found".

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use greenroom_config::model::PreviewConfig;
use greenroom_core::{
    Conversation, ConversationStore, CoordinationStore, GreenroomError, Message, NewMessage,
    PreviewRequest, PreviewResolution, PreviewState, new_id, now_rfc3339,
};

use crate::callback::{ConfirmCallback, PreviewDelivery};

fn preview_key(preview_id: &str) -> String {
    format!("preview/{preview_id}")
}

pub struct PreviewCoordinator {
    coord: Arc<dyn CoordinationStore>,
    store: Arc<dyn ConversationStore>,
    config: PreviewConfig,
    /// How long records stay readable; longer than the preview timeout.
    record_ttl: Duration,
    callbacks: RwLock<Vec<Arc<dyn ConfirmCallback>>>,
}

impl PreviewCoordinator {
    pub fn new(
        coord: Arc<dyn CoordinationStore>,
        store: Arc<dyn ConversationStore>,
        config: PreviewConfig,
        record_ttl: Duration,
    ) -> Self {
        Self {
            coord,
            store,
            config,
            record_ttl,
            callbacks: RwLock::new(Vec::new()),
        }
    }

    /// Seconds a preview may wait before the scanner resolves it.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    /// Human-facing review reference for a preview.
    pub fn review_url(&self, preview_id: &str) -> String {
        format!(
            "{}/{preview_id}",
            self.config.review_base_url.trim_end_matches('/')
        )
    }

    /// Registers a subscriber for resolved previews. Registration order is
    /// invocation order.
    pub async fn register_confirm_callback(&self, callback: Arc<dyn ConfirmCallback>) {
        self.callbacks.write().await.push(callback);
    }

    /// Stores a generated reply for human review and returns the pending
    /// record. The caller surfaces [`review_url`](Self::review_url) to the
    /// reviewer.
    pub async fn create_preview(
        &self,
        conversation: &Conversation,
        user_message: &Message,
        generated_content: &str,
        context: serde_json::Value,
        latency_ms: i64,
    ) -> Result<PreviewRequest, GreenroomError> {
        let now = now_rfc3339();
        let record = PreviewRequest {
            id: new_id(),
            conversation_id: conversation.id.clone(),
            message_id: user_message.id.clone(),
            sender_id: conversation.sender_id.clone(),
            platform: conversation.platform.clone(),
            original_content: generated_content.to_string(),
            edited_content: None,
            context,
            latency_ms,
            state: PreviewState::PendingConfirmation,
            resolution: None,
            created_at: now.clone(),
            updated_at: now,
        };

        let raw = serialize(&record)?;
        if !self
            .coord
            .compare_and_swap(&preview_key(&record.id), None, &raw, self.record_ttl)
            .await?
        {
            // A fresh UUID can only collide with itself.
            return Err(GreenroomError::Internal(format!(
                "preview id collision: {}",
                record.id
            )));
        }
        info!(
            preview_id = %record.id,
            conversation_id = %record.conversation_id,
            latency_ms,
            "preview created, awaiting confirmation"
        );
        Ok(record)
    }

    /// Fetches a preview record.
    pub async fn get_preview(&self, preview_id: &str) -> Result<PreviewRequest, GreenroomError> {
        Ok(self.load(preview_id).await?.1)
    }

    /// The content a resolution would deliver today: edited if present, else
    /// original. Readable in any state for audit.
    pub async fn get_effective_content(&self, preview_id: &str) -> Result<String, GreenroomError> {
        let (_, record) = self.load(preview_id).await?;
        Ok(record.effective_content().to_string())
    }

    /// Replaces the content a confirmation will deliver. Legal only while
    /// pending; the original generated content is kept for audit.
    pub async fn edit_content(
        &self,
        preview_id: &str,
        new_content: &str,
    ) -> Result<PreviewRequest, GreenroomError> {
        // Bounded retry: an edit only ever races another edit or a
        // resolution, both of which settle within a round or two.
        for _ in 0..3 {
            let (raw, record) = self.load(preview_id).await?;
            if record.state != PreviewState::PendingConfirmation {
                return Err(GreenroomError::PreviewAlreadyClosed {
                    preview_id: preview_id.to_string(),
                });
            }
            let mut edited = record;
            edited.edited_content = Some(new_content.to_string());
            edited.updated_at = now_rfc3339();
            let new_raw = serialize(&edited)?;
            if self
                .coord
                .compare_and_swap(
                    &preview_key(preview_id),
                    Some(raw.as_str()),
                    &new_raw,
                    self.record_ttl,
                )
                .await?
            {
                debug!(preview_id, "preview content edited");
                return Ok(edited);
            }
        }
        Err(GreenroomError::Internal(format!(
            "preview record contention on edit: {preview_id}"
        )))
    }

    /// Human approval: resolves the preview as confirmed, delivering the
    /// effective content.
    ///
    /// On the winning path the registered callbacks run first, then the
    /// assistant message is persisted with `is_timeout=false`, then the
    /// record closes. Losing the resolution race (or confirming twice)
    /// returns [`GreenroomError::PreviewAlreadyClosed`] and runs nothing.
    pub async fn confirm(&self, preview_id: &str) -> Result<PreviewRequest, GreenroomError> {
        let (raw, record) = self.load(preview_id).await?;
        let resolved = self
            .resolve(raw, record, PreviewResolution::Confirmed)
            .await?;
        info!(preview_id, "preview confirmed");
        self.finish(resolved).await
    }

    /// Timeout escalation: resolves the preview as timed out, delivering the
    /// *original* generated content with `is_timeout=true`. Called by the
    /// timeout scanner; subject to the same arbitration as `confirm`.
    pub async fn resolve_timed_out(
        &self,
        preview_id: &str,
    ) -> Result<PreviewRequest, GreenroomError> {
        let (raw, record) = self.load(preview_id).await?;
        let resolved = self
            .resolve(raw, record, PreviewResolution::TimedOut)
            .await?;
        info!(preview_id, "preview timed out, delivering original content");
        self.finish(resolved).await
    }

    /// CAS `PendingConfirmation` into the requested resolution. Exactly one
    /// caller per preview ever gets past this.
    async fn resolve(
        &self,
        raw: String,
        record: PreviewRequest,
        resolution: PreviewResolution,
    ) -> Result<PreviewRequest, GreenroomError> {
        if record.state != PreviewState::PendingConfirmation {
            return Err(GreenroomError::PreviewAlreadyClosed {
                preview_id: record.id.clone(),
            });
        }
        let mut resolved = record;
        resolved.state = match resolution {
            PreviewResolution::Confirmed => PreviewState::Confirmed,
            PreviewResolution::TimedOut => PreviewState::TimedOut,
        };
        resolved.resolution = Some(resolution);
        resolved.updated_at = now_rfc3339();

        let resolved_raw = serialize(&resolved)?;
        if !self
            .coord
            .compare_and_swap(
                &preview_key(&resolved.id),
                Some(raw.as_str()),
                &resolved_raw,
                self.record_ttl,
            )
            .await?
        {
            // The other resolution path won between our read and swap.
            return Err(GreenroomError::PreviewAlreadyClosed {
                preview_id: resolved.id.clone(),
            });
        }
        Ok(resolved)
    }

    /// Winning path after `resolve`: callbacks, persistence, closure. A
    /// callback failure is surfaced only after everything else completed.
    async fn finish(&self, resolved: PreviewRequest) -> Result<PreviewRequest, GreenroomError> {
        let is_timeout = resolved.resolution == Some(PreviewResolution::TimedOut);
        let content = if is_timeout {
            resolved.original_content.clone()
        } else {
            resolved.effective_content().to_string()
        };

        let callback_failure = self.run_callbacks(&resolved, &content).await;

        self.store
            .insert_message(NewMessage::assistant(
                &resolved.conversation_id,
                &content,
                is_timeout,
            ))
            .await?;

        let closed = self.close(resolved).await?;
        match callback_failure {
            Some(err) => Err(err),
            None => Ok(closed),
        }
    }

    async fn run_callbacks(
        &self,
        preview: &PreviewRequest,
        content: &str,
    ) -> Option<GreenroomError> {
        let Some(resolution) = preview.resolution else {
            return Some(GreenroomError::Internal(format!(
                "callbacks invoked on unresolved preview {}",
                preview.id
            )));
        };
        let delivery = PreviewDelivery {
            preview: preview.clone(),
            content: content.to_string(),
            resolution,
        };
        let subscribers = self.callbacks.read().await.clone();

        let mut first_failure = None;
        for callback in subscribers {
            if let Err(e) = callback.on_resolved(&delivery).await {
                warn!(
                    callback = callback.name(),
                    preview_id = %preview.id,
                    error = %e,
                    "confirm callback failed, continuing with the rest"
                );
                if first_failure.is_none() {
                    first_failure = Some(e);
                }
            }
        }
        first_failure
    }

    async fn close(&self, resolved: PreviewRequest) -> Result<PreviewRequest, GreenroomError> {
        let resolved_raw = serialize(&resolved)?;
        let mut closed = resolved;
        closed.state = PreviewState::Closed;
        closed.updated_at = now_rfc3339();
        let closed_raw = serialize(&closed)?;
        if !self
            .coord
            .compare_and_swap(
                &preview_key(&closed.id),
                Some(resolved_raw.as_str()),
                &closed_raw,
                self.record_ttl,
            )
            .await?
        {
            // Nothing else writes a resolved record; worth a trace if it
            // ever fires.
            warn!(preview_id = %closed.id, "preview record changed while closing");
        }
        Ok(closed)
    }

    async fn load(&self, preview_id: &str) -> Result<(String, PreviewRequest), GreenroomError> {
        let raw = self
            .coord
            .get(&preview_key(preview_id))
            .await?
            .ok_or_else(|| GreenroomError::PreviewNotFound {
                preview_id: preview_id.to_string(),
            })?;
        let record = serde_json::from_str(&raw)
            .map_err(|e| GreenroomError::Internal(format!("corrupt preview record: {e}")))?;
        Ok((raw, record))
    }
}

fn serialize(record: &PreviewRequest) -> Result<String, GreenroomError> {
    serde_json::to_string(record)
        .map_err(|e| GreenroomError::Internal(format!("preview record serialization: {e}")))
}
