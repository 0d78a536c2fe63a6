// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Orbis SPI request codes and per-transaction descriptors.

use crate::config::{OrbisConfig, Variant, PLACEHOLDER};

// Request codes (first byte clocked out by the master)
pub const CMD_POSITION: u8 = PLACEHOLDER;
pub const CMD_DETAILED_STATUS: u8 = b'd';
pub const CMD_TEMPERATURE: u8 = b't';
pub const CMD_SPEED: u8 = b'v';
pub const CMD_SERIAL_NUMBER: u8 = b's';

/// Position word: 14-bit angle + 2 general status bits.
pub const POSITION_BYTES: usize = 2;
/// Multi-turn counter prefix.
pub const TURNS_BYTES: usize = 2;
pub const SERIAL_BYTES: usize = 6;
pub const CRC_BYTES: usize = 1;

/// What the encoder should append after the position word.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// Position and general status only.
    Position,
    DetailedStatus,
    Temperature,
    Speed,
    SerialNumber,
}

impl Command {
    #[inline]
    pub fn code(self) -> u8 {
        match self {
            Command::Position => CMD_POSITION,
            Command::DetailedStatus => CMD_DETAILED_STATUS,
            Command::Temperature => CMD_TEMPERATURE,
            Command::Speed => CMD_SPEED,
            Command::SerialNumber => CMD_SERIAL_NUMBER,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            CMD_POSITION => Some(Command::Position),
            CMD_DETAILED_STATUS => Some(Command::DetailedStatus),
            CMD_TEMPERATURE => Some(Command::Temperature),
            CMD_SPEED => Some(Command::Speed),
            CMD_SERIAL_NUMBER => Some(Command::SerialNumber),
            _ => None,
        }
    }

    /// Bytes between the position word and the CRC.
    #[inline]
    pub fn extra_bytes(self) -> usize {
        match self {
            Command::Position => 0,
            Command::DetailedStatus => 1,
            Command::Temperature | Command::Speed => 2,
            Command::SerialNumber => SERIAL_BYTES,
        }
    }

    /// Full response length for `variant`, CRC included.
    pub fn response_len(self, variant: Variant) -> usize {
        let turns = match variant {
            Variant::SingleTurn => 0,
            Variant::MultiTurn => TURNS_BYTES,
        };
        turns + POSITION_BYTES + self.extra_bytes() + CRC_BYTES
    }
}

/// Everything one acquisition call needs to know. Lives for a single call.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Transaction {
    pub command: Command,
    /// Expected response length, CRC included.
    pub len: usize,
    pub settle_ticks: u32,
}

impl Transaction {
    pub fn new(command: Command, cfg: &OrbisConfig) -> Self {
        Self {
            command,
            len: command.response_len(cfg.variant),
            settle_ticks: cfg.settle_ticks(),
        }
    }
}
