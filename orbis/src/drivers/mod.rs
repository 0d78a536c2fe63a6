// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! # Device-Specific Drivers
//!
//! Drivers for the RLS Orbis encoder. They sit above the [`Transport`](crate::hw::Transport)
//! contract and below the application.
//!
//! ## Existing drivers
//!
//! - [`orbis`] – polling capture: the caller shifts every word and spins on end-of-transfer
//! - [`orbis_irq`] – interrupt-driven capture: the SPI interrupt drains the FIFO into a frame

pub mod orbis;
pub mod orbis_irq;

pub use orbis::{Orbis, State};
pub use orbis_irq::{FrameDrain, FrameQueue, IrqOrbis, SharedLink};
