// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The conversation manager.
//!
//! One instance per process, but logically a single service across the
//! deployment because durable state lives in the conversation store and the
//! pair-to-conversation binding lives in the coordination store. Only the
//! primary instance carries the in-memory cache; secondaries resolve through
//! the stores on every call.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use greenroom_config::model::ConversationConfig;
use greenroom_core::{
    Conversation, ConversationStore, CoordinationStore, GreenroomError, Message, MessageRole,
    NewMessage, ProcessRole, ReplyGenerator, ReplyStream, new_id, now_rfc3339,
};

use crate::cache::{ConversationCache, is_active};

pub struct ConversationManager {
    store: Arc<dyn ConversationStore>,
    coord: Arc<dyn CoordinationStore>,
    generator: Arc<dyn ReplyGenerator>,
    /// Present only on the primary.
    cache: Option<ConversationCache>,
    ttl: Duration,
    history_limit: u32,
}

impl ConversationManager {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        coord: Arc<dyn CoordinationStore>,
        generator: Arc<dyn ReplyGenerator>,
        role: ProcessRole,
        config: &ConversationConfig,
    ) -> Self {
        let ttl = Duration::from_secs(config.ttl_secs);
        Self {
            store,
            coord,
            generator,
            cache: role.is_primary().then(|| ConversationCache::new(ttl)),
            ttl,
            history_limit: config.history_limit,
        }
    }

    fn binding_key(platform: &str, sender_id: &str) -> String {
        format!("conv/{platform}/{sender_id}")
    }

    /// Returns the active conversation for a (sender, platform) pair,
    /// creating one if none is active.
    ///
    /// Race-tolerant: when two processes create simultaneously, the
    /// pair-to-conversation binding in the coordination store elects exactly
    /// one winner and the loser adopts it, so every process converges on the
    /// same conversation for subsequent messages.
    pub async fn resolve_or_create(
        &self,
        sender_id: &str,
        display_name: &str,
        platform: &str,
    ) -> Result<Conversation, GreenroomError> {
        if let Some(cache) = &self.cache
            && let Some(hit) = cache.get(platform, sender_id)
        {
            return Ok(hit);
        }

        let key = Self::binding_key(platform, sender_id);
        if let Some(bound_id) = self.coord.get(&key).await?
            && let Some(conversation) = self.store.get_conversation(&bound_id).await?
            && is_active(&conversation, self.ttl)
        {
            self.cache_insert(&conversation);
            return Ok(conversation);
        }

        if let Some(latest) = self
            .store
            .find_latest_by_sender_platform(sender_id, platform)
            .await?
            && is_active(&latest, self.ttl)
        {
            let adopted = self.bind_pair(latest).await?;
            self.cache_insert(&adopted);
            return Ok(adopted);
        }

        // Nothing active: create, persist, then race to publish the binding.
        let now = now_rfc3339();
        let fresh = Conversation {
            id: new_id(),
            sender_id: sender_id.to_string(),
            display_name: display_name.to_string(),
            platform: platform.to_string(),
            message_count: 0,
            created_at: now.clone(),
            last_active_at: now,
        };
        self.store.insert_conversation(&fresh).await?;
        let resolved = self.bind_pair(fresh).await?;
        self.cache_insert(&resolved);
        debug!(
            conversation_id = %resolved.id,
            sender_id,
            platform,
            "conversation resolved"
        );
        Ok(resolved)
    }

    /// Publishes `candidate` as the pair's conversation, unless another
    /// process bound a different active conversation first, in which case
    /// that winner is adopted. The candidate row must already be persisted,
    /// so whichever id the binding names is always readable.
    async fn bind_pair(&self, candidate: Conversation) -> Result<Conversation, GreenroomError> {
        let key = Self::binding_key(&candidate.platform, &candidate.sender_id);
        if self
            .coord
            .compare_and_swap(&key, None, &candidate.id, self.ttl)
            .await?
        {
            return Ok(candidate);
        }

        match self.coord.get(&key).await? {
            Some(winner_id) if winner_id == candidate.id => {
                // Bound to us already; refresh the binding's lease.
                self.coord
                    .compare_and_swap(&key, Some(candidate.id.as_str()), &candidate.id, self.ttl)
                    .await?;
                Ok(candidate)
            }
            Some(winner_id) => match self.store.get_conversation(&winner_id).await? {
                Some(winner) if is_active(&winner, self.ttl) => {
                    debug!(
                        candidate_id = %candidate.id,
                        winner_id = %winner.id,
                        "lost conversation creation race, adopting winner"
                    );
                    Ok(winner)
                }
                // Binding points at a dead or missing conversation; the
                // candidate stands and the binding heals on its next expiry.
                _ => Ok(candidate),
            },
            None => Ok(candidate),
        }
    }

    fn cache_insert(&self, conversation: &Conversation) {
        if let Some(cache) = &self.cache {
            cache.insert(conversation);
        }
    }

    /// Appends a message; the store assigns the sequence number and bumps
    /// the conversation's activity in the same transaction.
    pub async fn append_message(
        &self,
        conversation: &Conversation,
        content: &str,
        role: MessageRole,
        is_timeout: bool,
    ) -> Result<Message, GreenroomError> {
        let message = self
            .store
            .insert_message(NewMessage {
                conversation_id: conversation.id.clone(),
                role,
                content: content.to_string(),
                is_timeout,
            })
            .await?;
        if let Some(cache) = &self.cache {
            cache.apply_append(
                &conversation.id,
                &conversation.platform,
                &conversation.sender_id,
                &message.created_at,
            );
        }
        debug!(
            conversation_id = %conversation.id,
            seq = message.seq,
            role = %role,
            is_timeout,
            "message appended"
        );
        Ok(message)
    }

    async fn history_before(
        &self,
        conversation_id: &str,
        user_message: &Message,
    ) -> Result<Vec<Message>, GreenroomError> {
        let mut history = self
            .store
            .list_messages(conversation_id, self.history_limit)
            .await?;
        history.retain(|m| m.seq < user_message.seq);
        Ok(history)
    }

    /// Generates a reply to an already-persisted user message. No lock is
    /// held across the generator call; it may run for a long time.
    pub async fn generate_reply(
        &self,
        conversation: &Conversation,
        user_message: &Message,
    ) -> Result<String, GreenroomError> {
        let history = self.history_before(&conversation.id, user_message).await?;
        self.generator.generate(&history, &user_message.content).await
    }

    /// Streaming variant of [`generate_reply`](Self::generate_reply).
    pub async fn generate_reply_stream(
        &self,
        conversation: &Conversation,
        user_message: &Message,
    ) -> Result<ReplyStream, GreenroomError> {
        let history = self.history_before(&conversation.id, user_message).await?;
        self.generator
            .generate_stream(&history, &user_message.content)
            .await
    }

    /// Sweeps expired entries out of the local cache. Returns how many were
    /// removed; always zero on secondaries, which carry no cache.
    pub fn evict_expired(&self) -> usize {
        self.cache.as_ref().map_or(0, ConversationCache::evict_expired)
    }

    pub fn cache_size(&self) -> usize {
        self.cache.as_ref().map_or(0, ConversationCache::len)
    }
}
