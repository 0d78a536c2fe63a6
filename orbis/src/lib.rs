// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! # Orbis Acquisition Firmware
//!
//! This crate acquires position data from an RLS Orbis absolute rotary encoder over SPI,
//! validates each frame with the encoder's CRC-8 and decodes it. It targets an STM32F777 MCU,
//! while everything above the register layer is plain `no_std` Rust that runs on the host too.
//!
//! ## Crate Structure
//!
//! | Module | Purpose |
//! | ------ | -------- |
//! | [`config`] | Bus and driver configuration with validation |
//! | [`crc`] | Table-driven CRC-8, polynomial 0x97 |
//! | [`frame`] | Frame buffer, CRC diagnostics and the sticky error flag |
//! | [`protocol`] | Orbis commands and response decoding |
//! | [`drivers`] | Polling and interrupt-driven capture drivers |
//! | [`hw`] | Transport contract, tick sources and STM32F7 peripherals |
//! | [`error`] | Error taxonomy |
//!
//! ## Getting Started
//!
//! Run the host tests:
//!
//! ```bash
//! cargo test
//! ```
//!
//! Flash the board (add `--features firmware,irq` for interrupt-driven capture):
//!
//! ```bash
//! cargo run --release --features firmware --target thumbv7em-none-eabihf
//! ```
//!
//! ## License
//!
//! Licensed under the **MIT License**.
//! See the `LICENSE` file in the repository root for full terms.
//!
//! © 2025–2026 Christopher Liu

#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod crc;
pub mod drivers;
pub mod error;
pub mod frame;
pub mod hw;
pub mod protocol;

#[cfg(test)]
mod test_support;

pub use config::{Channel, Direction, OrbisConfig, Variant};
pub use drivers::{IrqOrbis, Orbis};
pub use error::Error;
pub use frame::{CrcStatus, Frame};
pub use protocol::{Command, Reading};
