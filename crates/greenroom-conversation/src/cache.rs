// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory conversation cache, held only by the primary process.

use std::time::Duration;

use dashmap::DashMap;

use greenroom_core::Conversation;

pub(crate) fn pair_key(platform: &str, sender_id: &str) -> String {
    format!("{platform}/{sender_id}")
}

/// True while the conversation's last activity is within the inactivity TTL.
/// An unparseable timestamp reads as inactive, which at worst costs one
/// fresh conversation.
pub(crate) fn is_active(conversation: &Conversation, ttl: Duration) -> bool {
    let Ok(last_active) = chrono::DateTime::parse_from_rfc3339(&conversation.last_active_at) else {
        return false;
    };
    let age = chrono::Utc::now().signed_duration_since(last_active);
    match chrono::Duration::from_std(ttl) {
        Ok(limit) => age < limit,
        Err(_) => true,
    }
}

/// Pair-keyed conversation cache with lazy expiry on lookup and periodic
/// sweeps. Purely a read optimization: durable state never depends on it.
pub(crate) struct ConversationCache {
    ttl: Duration,
    entries: DashMap<String, Conversation>,
}

impl ConversationCache {
    pub(crate) fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
        }
    }

    pub(crate) fn get(&self, platform: &str, sender_id: &str) -> Option<Conversation> {
        let key = pair_key(platform, sender_id);
        let hit = self.entries.get(&key).map(|entry| entry.value().clone())?;
        if is_active(&hit, self.ttl) {
            Some(hit)
        } else {
            self.entries.remove(&key);
            None
        }
    }

    pub(crate) fn insert(&self, conversation: &Conversation) {
        self.entries.insert(
            pair_key(&conversation.platform, &conversation.sender_id),
            conversation.clone(),
        );
    }

    /// Folds an append's effects into the cached copy, if the pair still
    /// maps to the same conversation.
    pub(crate) fn apply_append(
        &self,
        conversation_id: &str,
        platform: &str,
        sender_id: &str,
        last_active_at: &str,
    ) {
        if let Some(mut entry) = self.entries.get_mut(&pair_key(platform, sender_id))
            && entry.id == conversation_id
        {
            entry.message_count += 1;
            entry.last_active_at = last_active_at.to_string();
        }
    }

    /// Drops entries past the TTL. Returns how many were removed.
    pub(crate) fn evict_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, conversation| is_active(conversation, self.ttl));
        before.saturating_sub(self.entries.len())
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
