// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles a complete worker stack with mock generator and
//! platform, temp SQLite databases, and all required subsystems. Provides
//! `send()` to drive the full inbound pipeline in tests. Two harnesses built
//! on the same data directory stand in for two worker processes sharing the
//! coordination and conversation stores.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use greenroom_config::model::{
    CoordinationConfig, GreenroomConfig, PreviewConfig, ProcessConfig, StorageConfig,
};
use greenroom_conversation::ConversationManager;
use greenroom_coord::SqliteCoordStore;
use greenroom_core::{
    GreenroomError, InboundMessage, InboundOutcome, ProcessRole, ReplyGenerator,
};
use greenroom_dedup::Deduplicator;
use greenroom_pipeline::{Pipeline, PlatformDeliveryCallback};
use greenroom_preview::{PreviewCoordinator, TimeoutScanner};
use greenroom_storage::SqliteConversationStore;

use crate::mock_generator::MockGenerator;
use crate::mock_platform::MockPlatform;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    replies: Vec<String>,
    role: ProcessRole,
    preview_timeout_secs: Option<u64>,
    data_dir: Option<PathBuf>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            replies: Vec::new(),
            role: ProcessRole::Primary,
            preview_timeout_secs: None,
            data_dir: None,
        }
    }

    /// Set mock generator replies.
    pub fn with_replies(mut self, replies: Vec<String>) -> Self {
        self.replies = replies;
        self
    }

    /// Set the process role (default: primary).
    pub fn with_role(mut self, role: ProcessRole) -> Self {
        self.role = role;
        self
    }

    /// Enable previews with the given confirmation timeout.
    pub fn with_previews(mut self, timeout_secs: u64) -> Self {
        self.preview_timeout_secs = Some(timeout_secs);
        self
    }

    /// Share an existing data directory instead of creating a fresh temp
    /// dir. Use with another harness's [`TestHarness::data_dir`] to emulate
    /// a second worker process on the same stores.
    pub fn with_data_dir(mut self, dir: PathBuf) -> Self {
        self.data_dir = Some(dir);
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, GreenroomError> {
        let (temp_dir, data_dir) = match self.data_dir {
            Some(dir) => (None, dir),
            None => {
                let temp = tempfile::TempDir::new().map_err(|e| {
                    GreenroomError::Internal(format!("temp dir creation failed: {e}"))
                })?;
                let path = temp.path().to_path_buf();
                (Some(temp), path)
            }
        };

        let instance_id = format!("test-{}", uuid::Uuid::new_v4());
        let config = GreenroomConfig {
            process: ProcessConfig {
                role: self.role,
                instance_id: Some(instance_id.clone()),
                log_level: "info".to_string(),
            },
            storage: StorageConfig {
                database_path: data_dir
                    .join("conversations.db")
                    .to_string_lossy()
                    .into_owned(),
                wal_mode: true,
            },
            coordination: CoordinationConfig {
                database_path: data_dir
                    .join("coordination.db")
                    .to_string_lossy()
                    .into_owned(),
                busy_timeout_ms: 5000,
            },
            preview: PreviewConfig {
                enabled: self.preview_timeout_secs.is_some(),
                timeout_secs: self.preview_timeout_secs.unwrap_or(120),
                ..PreviewConfig::default()
            },
            ..GreenroomConfig::default()
        };

        let coord = Arc::new(SqliteCoordStore::open(&config.coordination).await?);
        let store = Arc::new(SqliteConversationStore::open(&config.storage).await?);

        let mock_generator = Arc::new(MockGenerator::with_replies(self.replies));
        let mock_platform = Arc::new(MockPlatform::new());

        let conversations = Arc::new(ConversationManager::new(
            store.clone(),
            coord.clone(),
            mock_generator.clone() as Arc<dyn ReplyGenerator>,
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
                .register_confirm_callback(Arc::new(PlatformDeliveryCallback::new(
                    mock_platform.clone(),
                )))
                .await;
            Some(coordinator)
        } else {
            None
        };

        let pipeline = Arc::new(Pipeline::new(
            dedup.clone(),
            conversations.clone(),
            previews.clone(),
        ));

        Ok(TestHarness {
            mock_generator,
            mock_platform,
            coord,
            store,
            conversations,
            dedup,
            previews,
            pipeline,
            config,
            instance_id,
            data_dir,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment with mock collaborators and temp storage.
pub struct TestHarness {
    /// The mock reply generator.
    pub mock_generator: Arc<MockGenerator>,
    /// The mock platform adapter, registered as a preview delivery callback
    /// when previews are enabled.
    pub mock_platform: Arc<MockPlatform>,
    /// Shared coordination store (temp SQLite file).
    pub coord: Arc<SqliteCoordStore>,
    /// Conversation store (temp SQLite file).
    pub store: Arc<SqliteConversationStore>,
    /// The conversation manager.
    pub conversations: Arc<ConversationManager>,
    /// The message deduplicator.
    pub dedup: Arc<Deduplicator>,
    /// Preview coordinator, present when built `with_previews`.
    pub previews: Option<Arc<PreviewCoordinator>>,
    /// The assembled inbound pipeline.
    pub pipeline: Arc<Pipeline>,
    /// The effective configuration.
    pub config: GreenroomConfig,
    /// This harness's process label in coordination claims.
    pub instance_id: String,
    data_dir: PathBuf,
    /// Temp directory kept alive for cleanup on drop; `None` when sharing
    /// another harness's directory.
    _temp_dir: Option<tempfile::TempDir>,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Directory holding this harness's database files. Pass to
    /// [`TestHarnessBuilder::with_data_dir`] to attach a second process.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Send a message from the default test user through the full pipeline.
    pub async fn send(&self, content: &str) -> Result<InboundOutcome, GreenroomError> {
        self.pipeline.handle_inbound(&inbound("test-user", content)).await
    }

    /// Send an arbitrary inbound message through the full pipeline.
    pub async fn send_message(
        &self,
        message: &InboundMessage,
    ) -> Result<InboundOutcome, GreenroomError> {
        self.pipeline.handle_inbound(message).await
    }

    /// A timeout scanner for this harness; `None` when previews are
    /// disabled.
    pub fn scanner(&self) -> Option<TimeoutScanner> {
        self.previews.as_ref().map(|coordinator| {
            TimeoutScanner::new(
                self.coord.clone(),
                coordinator.clone(),
                &self.config.preview,
                &self.instance_id,
            )
        })
    }
}

/// A normalized inbound message on the harness's `"mock"` platform.
pub fn inbound(sender_id: &str, content: &str) -> InboundMessage {
    InboundMessage {
        sender_id: sender_id.to_string(),
        display_name: "Test User".to_string(),
        platform: "mock".to_string(),
        content: content.to_string(),
        hints: Default::default(),
    }
}
