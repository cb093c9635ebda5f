// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable SQLite storage for conversations and messages.
//!
//! The store is append-only from the caller's point of view: messages are
//! never updated or deleted, and conversations are never hard-deleted.
//! Sequence numbers are assigned here, inside the append transaction, which
//! is what makes them strictly increasing and contiguous no matter how many
//! worker processes append concurrently.

pub mod database;
mod migrations;
mod queries;
mod store;

pub use database::Database;
pub use store::SqliteConversationStore;
