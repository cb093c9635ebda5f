// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message deduplication: at most one active processing per fingerprint
//! within a bounded window, across any number of worker processes.

mod claim;
mod fingerprint;

pub use claim::{ClaimOutcome, Deduplicator};
pub use fingerprint::fingerprint;
