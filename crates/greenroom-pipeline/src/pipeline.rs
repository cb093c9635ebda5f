// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end handling of one inbound message.
//!
//! The pipeline sequences the subsystems: claim the message's fingerprint,
//! resolve the conversation, persist the user message, generate a reply, then
//! either hand the reply to the preview coordinator or persist it directly
//! for the caller to deliver. Any process can run any number of pipelines;
//! all cross-process arbitration lives in the stores underneath.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use greenroom_conversation::ConversationManager;
use greenroom_core::{GreenroomError, InboundMessage, InboundOutcome, MessageRole};
use greenroom_dedup::{ClaimOutcome, Deduplicator, fingerprint};
use greenroom_preview::PreviewCoordinator;

pub struct Pipeline {
    dedup: Arc<Deduplicator>,
    conversations: Arc<ConversationManager>,
    /// Present when previews are enabled; `None` means replies go straight
    /// to the conversation store and back to the caller.
    previews: Option<Arc<PreviewCoordinator>>,
}

impl Pipeline {
    pub fn new(
        dedup: Arc<Deduplicator>,
        conversations: Arc<ConversationManager>,
        previews: Option<Arc<PreviewCoordinator>>,
    ) -> Self {
        Self {
            dedup,
            conversations,
            previews,
        }
    }

    /// Handles one normalized inbound message end to end.
    ///
    /// The user message is persisted before generation starts, so a crash
    /// mid-generation never loses what the sender said. With previews
    /// enabled the generated reply is parked for review and the assistant
    /// message is persisted later, by whichever resolution path wins.
    ///
    /// Infrastructure errors propagate unmodified. A failed attempt leaves
    /// the fingerprint claim in place, so a platform retry within the dedup
    /// window is dropped instead of reprocessed.
    pub async fn handle_inbound(
        &self,
        inbound: &InboundMessage,
    ) -> Result<InboundOutcome, GreenroomError> {
        // 1. Claim the fingerprint; losers drop the message.
        let fp = fingerprint(inbound);
        match self.dedup.try_claim(&fp).await? {
            ClaimOutcome::Claimed => {}
            outcome => {
                info!(
                    sender_id = %inbound.sender_id,
                    platform = %inbound.platform,
                    ?outcome,
                    "dropping duplicate inbound message"
                );
                return Ok(InboundOutcome::DroppedDuplicate);
            }
        }

        // 2. Resolve the conversation and persist the user message.
        let conversation = self
            .conversations
            .resolve_or_create(&inbound.sender_id, &inbound.display_name, &inbound.platform)
            .await?;
        let user_message = self
            .conversations
            .append_message(&conversation, &inbound.content, MessageRole::User, false)
            .await?;

        // 3. Generate. No lock is held; this may run for a long time.
        let started = Instant::now();
        let reply = self
            .conversations
            .generate_reply(&conversation, &user_message)
            .await?;
        let latency_ms = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);

        // 4. Park the reply for review, or persist and hand it back.
        let outcome = if let Some(previews) = &self.previews {
            let preview = previews
                .create_preview(
                    &conversation,
                    &user_message,
                    &reply,
                    serde_json::json!({ "user_content": inbound.content }),
                    latency_ms,
                )
                .await?;
            let review_url = previews.review_url(&preview.id);
            InboundOutcome::PendingPreview {
                preview_id: preview.id,
                review_url,
            }
        } else {
            self.conversations
                .append_message(&conversation, &reply, MessageRole::Assistant, false)
                .await?;
            InboundOutcome::Delivered { content: reply }
        };

        // 5. Flip the claim to done; late retries now read as duplicates.
        if let Err(e) = self.dedup.mark_completed(&fp).await {
            warn!(error = %e, "failed to mark fingerprint completed");
        }

        debug!(
            conversation_id = %conversation.id,
            latency_ms,
            pending_preview = matches!(outcome, InboundOutcome::PendingPreview { .. }),
            "inbound message handled"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use tempfile::tempdir;

    use greenroom_config::model::{
        ConversationConfig, CoordinationConfig, PreviewConfig, StorageConfig,
    };
    use greenroom_coord::SqliteCoordStore;
    use greenroom_core::{
        ConversationStore, Message, ProcessRole, ReplyGenerator, ReplyStream,
    };
    use greenroom_storage::SqliteConversationStore;

    use super::*;

    struct EchoGenerator;

    #[async_trait]
    impl ReplyGenerator for EchoGenerator {
        async fn generate(
            &self,
            _history: &[Message],
            content: &str,
        ) -> Result<String, GreenroomError> {
            Ok(format!("echo: {content}"))
        }

        async fn generate_stream(
            &self,
            _history: &[Message],
            content: &str,
        ) -> Result<ReplyStream, GreenroomError> {
            let reply = format!("echo: {content}");
            Ok(Box::pin(futures::stream::iter(vec![Ok(reply)])))
        }
    }

    struct BrokenGenerator;

    #[async_trait]
    impl ReplyGenerator for BrokenGenerator {
        async fn generate(
            &self,
            _history: &[Message],
            _content: &str,
        ) -> Result<String, GreenroomError> {
            Err(GreenroomError::GenerationFailed {
                message: "upstream unavailable".to_string(),
                source: None,
            })
        }

        async fn generate_stream(
            &self,
            _history: &[Message],
            _content: &str,
        ) -> Result<ReplyStream, GreenroomError> {
            Err(GreenroomError::GenerationFailed {
                message: "upstream unavailable".to_string(),
                source: None,
            })
        }
    }

    struct World {
        _dir: tempfile::TempDir,
        store: Arc<SqliteConversationStore>,
        previews: Option<Arc<PreviewCoordinator>>,
        pipeline: Pipeline,
    }

    async fn world(generator: Arc<dyn ReplyGenerator>, with_previews: bool) -> World {
        let dir = tempdir().unwrap();
        let coord: Arc<SqliteCoordStore> = Arc::new(
            SqliteCoordStore::open(&CoordinationConfig {
                database_path: dir.path().join("coord.db").to_string_lossy().into_owned(),
                busy_timeout_ms: 5000,
            })
            .await
            .unwrap(),
        );
        let store = Arc::new(
            SqliteConversationStore::open(&StorageConfig {
                database_path: dir.path().join("conv.db").to_string_lossy().into_owned(),
                wal_mode: true,
            })
            .await
            .unwrap(),
        );

        let conversations = Arc::new(ConversationManager::new(
            store.clone(),
            coord.clone(),
            generator,
            ProcessRole::Primary,
            &ConversationConfig {
                ttl_secs: 1800,
                sweep_interval_secs: 60,
                history_limit: 50,
            },
        ));
        let dedup = Arc::new(Deduplicator::new(
            coord.clone(),
            Duration::from_secs(420),
            "test-proc",
        ));
        let previews = with_previews.then(|| {
            Arc::new(PreviewCoordinator::new(
                coord.clone(),
                store.clone(),
                PreviewConfig {
                    enabled: true,
                    timeout_secs: 120,
                    scan_interval_secs: 5,
                    review_base_url: "http://localhost:8700/previews".to_string(),
                },
                Duration::from_secs(420),
            ))
        });

        let pipeline = Pipeline::new(dedup, conversations, previews.clone());
        World {
            _dir: dir,
            store,
            previews,
            pipeline,
        }
    }

    fn inbound(content: &str) -> InboundMessage {
        InboundMessage {
            sender_id: "u1".to_string(),
            display_name: "Uma".to_string(),
            platform: "web".to_string(),
            content: content.to_string(),
            hints: Default::default(),
        }
    }

    #[tokio::test]
    async fn fresh_message_is_answered_and_persisted() {
        let w = world(Arc::new(EchoGenerator), false).await;

        let outcome = w.pipeline.handle_inbound(&inbound("hi")).await.unwrap();
        assert_eq!(
            outcome,
            InboundOutcome::Delivered {
                content: "echo: hi".to_string()
            }
        );

        let conversation = w
            .store
            .find_latest_by_sender_platform("u1", "web")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(conversation.message_count, 2);
        let messages = w.store.list_messages(&conversation.id, 10).await.unwrap();
        assert_eq!(messages[0].seq, 1);
        assert_eq!(messages[0].content, "hi");
        assert_eq!(messages[1].seq, 2);
        assert_eq!(messages[1].content, "echo: hi");
    }

    #[tokio::test]
    async fn redelivered_message_is_dropped() {
        let w = world(Arc::new(EchoGenerator), false).await;
        let msg = InboundMessage {
            hints: greenroom_core::FingerprintHints {
                message_id: Some("m-77".to_string()),
                session_id: None,
            },
            ..inbound("hi again")
        };

        let first = w.pipeline.handle_inbound(&msg).await.unwrap();
        assert!(matches!(first, InboundOutcome::Delivered { .. }));

        let second = w.pipeline.handle_inbound(&msg).await.unwrap();
        assert_eq!(second, InboundOutcome::DroppedDuplicate);

        // Only the first delivery appended rows.
        let conversation = w
            .store
            .find_latest_by_sender_platform("u1", "web")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(conversation.message_count, 2);
    }

    #[tokio::test]
    async fn preview_path_parks_reply_until_confirmed() {
        let w = world(Arc::new(EchoGenerator), true).await;

        let outcome = w.pipeline.handle_inbound(&inbound("hello")).await.unwrap();
        let InboundOutcome::PendingPreview {
            preview_id,
            review_url,
        } = outcome
        else {
            panic!("expected a pending preview, got {outcome:?}");
        };
        assert_eq!(
            review_url,
            format!("http://localhost:8700/previews/{preview_id}")
        );

        // Only the user message is durable while the preview pends.
        let conversation = w
            .store
            .find_latest_by_sender_platform("u1", "web")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(conversation.message_count, 1);

        let previews = w.previews.as_ref().unwrap();
        previews.confirm(&preview_id).await.unwrap();
        let messages = w.store.list_messages(&conversation.id, 10).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, "echo: hello");
        assert!(!messages[1].is_timeout);
    }

    #[tokio::test]
    async fn generation_failure_propagates_and_keeps_the_claim() {
        let w = world(Arc::new(BrokenGenerator), false).await;
        let msg = InboundMessage {
            hints: greenroom_core::FingerprintHints {
                message_id: Some("m-9".to_string()),
                session_id: None,
            },
            ..inbound("doomed")
        };

        let err = w.pipeline.handle_inbound(&msg).await.unwrap_err();
        assert!(matches!(err, GreenroomError::GenerationFailed { .. }));

        // The user message survived the failure.
        let conversation = w
            .store
            .find_latest_by_sender_platform("u1", "web")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(conversation.message_count, 1);

        // A platform retry inside the window reads as a duplicate.
        let retry = w.pipeline.handle_inbound(&msg).await.unwrap();
        assert_eq!(retry, InboundOutcome::DroppedDuplicate);
    }

    #[tokio::test]
    async fn distinct_messages_share_one_conversation() {
        let w = world(Arc::new(EchoGenerator), false).await;

        w.pipeline.handle_inbound(&inbound("first")).await.unwrap();
        w.pipeline.handle_inbound(&inbound("second")).await.unwrap();

        let conversation = w
            .store
            .find_latest_by_sender_platform("u1", "web")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(conversation.message_count, 4);
        let seqs: Vec<i64> = w
            .store
            .list_messages(&conversation.id, 10)
            .await
            .unwrap()
            .iter()
            .map(|m| m.seq)
            .collect();
        assert_eq!(seqs, vec![1, 2, 3, 4]);
    }
}
