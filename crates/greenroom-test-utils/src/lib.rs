// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Greenroom integration tests.
//!
//! Provides mock collaborators and harness infrastructure for fast,
//! deterministic, CI-runnable tests without external services.
//!
//! # Components
//!
//! - [`MockGenerator`] - Reply generator with pre-queued responses
//! - [`MockPlatform`] - Platform adapter that captures deliveries
//! - [`TestHarness`] - Full worker stack on temp SQLite databases

pub mod harness;
pub mod mock_generator;
pub mod mock_platform;

pub use harness::{TestHarness, TestHarnessBuilder, inbound};
pub use mock_generator::MockGenerator;
pub use mock_platform::{Delivery, MockPlatform};
