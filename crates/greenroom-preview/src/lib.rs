// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reply previews: generated content held for human review, confirmed or
//! timed out exactly once across all worker processes, then delivered
//! through registered callbacks.

mod callback;
mod coordinator;
mod scanner;

pub use callback::{ConfirmCallback, PreviewDelivery};
pub use coordinator::PreviewCoordinator;
pub use scanner::{ScanOutcome, TimeoutScanner, run_scanner_loop};
