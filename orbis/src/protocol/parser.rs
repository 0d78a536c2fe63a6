// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Response parser for validated Orbis frames.
//!
//! Layout of a response, all multi-byte fields big-endian:
//!
//! | Field | Bytes | Present |
//! | ----- | ----- | ------- |
//! | turn counter | 2 | multi-turn encoders only |
//! | position + general status | 2 | always |
//! | command payload | 0, 1, 2 or 6 | depends on [`Command`] |
//! | inverted CRC | 1 | always |
//!
//! Parsing does not check the CRC; run [`Diagnostics::validate`](crate::frame::Diagnostics)
//! first.

use crate::config::Variant;
use crate::error::{Error, Malformed};
use crate::frame::Frame;
use crate::protocol::messages::{Command, POSITION_BYTES, SERIAL_BYTES, TURNS_BYTES};

/// Counts per revolution of the 14-bit position.
pub const COUNTS_PER_REV: u32 = 1 << 14;

/// Position word: 14-bit angle in the upper bits, error and warning flags in the lower two.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Position {
    raw: u16,
}

impl Position {
    #[inline]
    pub fn from_raw(raw: u16) -> Self {
        Self { raw }
    }

    #[inline]
    pub fn raw(&self) -> u16 {
        self.raw
    }

    /// Angle in counts, 0 to 16383.
    #[inline]
    pub fn counts(&self) -> u16 {
        self.raw >> 2
    }

    /// Angle in degrees.
    #[inline]
    pub fn degrees(&self) -> f32 {
        self.counts() as f32 * 360.0 / COUNTS_PER_REV as f32
    }

    /// General error: position is not valid. Active low on the wire.
    #[inline]
    pub fn error(&self) -> bool {
        (self.raw & (1 << 1)) == 0
    }

    /// General warning: position valid but some parameter is near its limit. Active low on the
    /// wire.
    #[inline]
    pub fn warning(&self) -> bool {
        (self.raw & (1 << 0)) == 0
    }
}

/// Detailed status byte returned for [`Command::DetailedStatus`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DetailedStatus {
    raw: u8,
}

impl DetailedStatus {
    #[inline]
    pub fn raw(&self) -> u8 {
        self.raw
    }

    /// Signal amplitude too high (magnet too close).
    #[inline]
    pub fn signal_too_high(&self) -> bool {
        (self.raw & (1 << 7)) != 0
    }

    /// Signal amplitude too low (magnet too far or missing).
    #[inline]
    pub fn signal_too_low(&self) -> bool {
        (self.raw & (1 << 6)) != 0
    }

    /// Readhead temperature out of range.
    #[inline]
    pub fn temperature_out_of_range(&self) -> bool {
        (self.raw & (1 << 5)) != 0
    }

    /// Rotation speed too high for reliable readings.
    #[inline]
    pub fn speed_too_high(&self) -> bool {
        (self.raw & (1 << 4)) != 0
    }

    /// Multi-turn counter error.
    #[inline]
    pub fn multiturn_error(&self) -> bool {
        (self.raw & (1 << 3)) != 0
    }
}

/// Command-specific part of a reading.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Extra {
    None,
    Status(DetailedStatus),
    /// Tenths of a degree Celsius.
    Temperature(i16),
    /// Tenths of an RPM, signed by direction.
    Speed(i16),
    /// ASCII serial number.
    Serial([u8; SERIAL_BYTES]),
}

/// One decoded encoder response.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Reading {
    /// Turn counter, multi-turn encoders only.
    pub turns: Option<u16>,
    pub position: Position,
    pub extra: Extra,
}

impl Reading {
    /// Temperature in degrees Celsius, if this was a temperature request.
    pub fn celsius(&self) -> Option<f32> {
        match self.extra {
            Extra::Temperature(t) => Some(t as f32 / 10.0),
            _ => None,
        }
    }

    /// Speed in RPM, if this was a speed request.
    pub fn rpm(&self) -> Option<f32> {
        match self.extra {
            Extra::Speed(s) => Some(s as f32 / 10.0),
            _ => None,
        }
    }
}

/// Split a validated `frame` into its fields.
pub fn parse(command: Command, variant: Variant, frame: &Frame) -> Result<Reading, Error> {
    let expected = command.response_len(variant);
    if frame.len() != expected {
        return Err(Malformed::LengthMismatch {
            expected,
            actual: frame.len(),
        }
        .into());
    }

    let payload = frame.payload();
    let be16 = |at: usize| u16::from_be_bytes([payload[at], payload[at + 1]]);

    let (turns, at) = match variant {
        Variant::SingleTurn => (None, 0),
        Variant::MultiTurn => (Some(be16(0)), TURNS_BYTES),
    };
    let position = Position::from_raw(be16(at));
    let at = at + POSITION_BYTES;

    let extra = match command {
        Command::Position => Extra::None,
        Command::DetailedStatus => Extra::Status(DetailedStatus { raw: payload[at] }),
        Command::Temperature => Extra::Temperature(be16(at) as i16),
        Command::Speed => Extra::Speed(be16(at) as i16),
        Command::SerialNumber => {
            let mut serial = [0u8; SERIAL_BYTES];
            serial.copy_from_slice(&payload[at..at + SERIAL_BYTES]);
            Extra::Serial(serial)
        }
    };

    Ok(Reading {
        turns,
        position,
        extra,
    })
}
