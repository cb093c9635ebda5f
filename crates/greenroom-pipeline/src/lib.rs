// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The inbound pipeline: one call that takes a normalized platform message
//! through dedup, conversation resolution, generation, and either preview
//! hand-off or direct persistence.

mod delivery;
mod pipeline;
mod shutdown;

pub use delivery::PlatformDeliveryCallback;
pub use pipeline::Pipeline;
pub use shutdown::install_signal_handler;
