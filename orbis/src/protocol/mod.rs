// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

pub mod messages;
pub mod parser;

pub use messages::{Command, Transaction};
pub use parser::{parse, DetailedStatus, Extra, Position, Reading};
