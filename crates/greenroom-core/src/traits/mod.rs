// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator trait definitions for the Greenroom coordination layer.
//!
//! All traits use `#[async_trait]` for dynamic dispatch compatibility; the
//! services in higher crates hold them as `Arc<dyn Trait>`.

pub mod conversation;
pub mod coordination;
pub mod generator;
pub mod platform;

// Re-export all traits at the traits module level for convenience.
pub use conversation::ConversationStore;
pub use coordination::CoordinationStore;
pub use generator::{ReplyGenerator, ReplyStream};
pub use platform::PlatformAdapter;
