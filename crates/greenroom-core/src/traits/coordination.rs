// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared coordination store trait: cross-process mutual exclusion, expiring
//! key/value entries, and atomic read-modify-write.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::GreenroomError;
use crate::types::AcquireOutcome;

/// Primitives usable safely from multiple OS processes without a shared heap.
///
/// Every operation is atomic with respect to concurrent callers in other
/// processes. Contended keys (the pair-to-conversation map, preview state,
/// dedup fingerprints, the scanner lease) must only ever be mutated through
/// [`acquire`](CoordinationStore::acquire) or
/// [`compare_and_swap`](CoordinationStore::compare_and_swap) — plain
/// read-then-write loses updates.
///
/// Expiry is evaluated on the store's own clock, so per-process clock skew
/// cannot break TTL correctness. When the backing medium is unreachable,
/// every operation fails with [`GreenroomError::CoordinationUnavailable`]
/// and callers must fail closed.
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    /// Atomically claims `key` for `owner` with the given lease TTL.
    ///
    /// Returns [`AcquireOutcome::AlreadyHeld`] if the key is held unexpired
    /// by a different owner. Re-acquiring a key the same owner already holds
    /// renews the lease.
    async fn acquire(
        &self,
        key: &str,
        owner: &str,
        ttl: Duration,
    ) -> Result<AcquireOutcome, GreenroomError>;

    /// Stores `value` under `key`, replacing any previous value and
    /// restarting the TTL.
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), GreenroomError>;

    /// Fetches the value under `key`. An expired entry behaves as absent.
    async fn get(&self, key: &str) -> Result<Option<String>, GreenroomError>;

    /// Removes `key`. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), GreenroomError>;

    /// Atomically replaces the value under `key` with `new` if the current
    /// unexpired value equals `expected`. `expected = None` means "insert
    /// only if the key is absent or expired". Returns whether the swap won.
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: &str,
        ttl: Duration,
    ) -> Result<bool, GreenroomError>;

    /// Lists all unexpired `(key, value)` entries whose key starts with
    /// `prefix`. Read-only; used by the timeout scanner to enumerate pending
    /// previews.
    async fn list_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>, GreenroomError>;

    /// Physically removes expired entries and returns how many were dropped.
    /// Expiry is already enforced on read, so this is housekeeping; backends
    /// without persistent garbage keep the no-op default.
    async fn purge_expired(&self) -> Result<usize, GreenroomError> {
        Ok(0)
    }
}
