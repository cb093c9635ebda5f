// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation management: resolving the active conversation for a
//! (sender, platform) pair, appending messages, and orchestrating reply
//! generation around persistence.

mod cache;
mod manager;
mod sweep;

pub use manager::ConversationManager;
pub use sweep::run_eviction_loop;
