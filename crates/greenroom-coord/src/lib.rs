// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite-backed shared coordination store.
//!
//! Implements [`greenroom_core::CoordinationStore`] over a single SQLite file
//! in WAL mode. Every worker process opens the same file; SQLite's locking
//! serializes the atomic claim and compare-and-swap statements, and expiry is
//! evaluated on the database's own clock so cross-process clock skew cannot
//! break TTL correctness.

pub mod store;

pub use store::SqliteCoordStore;
