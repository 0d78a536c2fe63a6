// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Response frame buffer and CRC diagnostics.

use log::warn;

use crate::crc::crc8;
use crate::error::{Error, Malformed};

/// Longest response: multi-turn counter (2) + position (2) + serial number (6) + CRC (1).
pub const FRAME_CAPACITY: usize = 11;

/// One encoder response, CRC byte last.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Frame {
    bytes: [u8; FRAME_CAPACITY],
    len: usize,
}

impl Default for Frame {
    fn default() -> Self {
        Self::new()
    }
}

impl Frame {
    pub const fn new() -> Self {
        Self {
            bytes: [0; FRAME_CAPACITY],
            len: 0,
        }
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() > FRAME_CAPACITY {
            return Err(Malformed::FrameFull.into());
        }
        let mut frame = Self::new();
        frame.bytes[..bytes.len()].copy_from_slice(bytes);
        frame.len = bytes.len();
        Ok(frame)
    }

    /// Append one received byte.
    pub fn push(&mut self, byte: u8) -> Result<(), Error> {
        let slot = self.bytes.get_mut(self.len).ok_or(Malformed::FrameFull)?;
        *slot = byte;
        self.len += 1;
        Ok(())
    }

    #[inline]
    pub fn clear(&mut self) {
        self.len = 0;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// Trailing CRC byte as transmitted (complemented).
    #[inline]
    pub fn crc_byte(&self) -> Option<u8> {
        self.as_slice().last().copied()
    }

    /// Everything before the CRC byte.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.bytes[..self.len.saturating_sub(1)]
    }
}

/// Outcome of validating one frame.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CrcStatus {
    Ok,
    Fail,
}

impl CrcStatus {
    #[inline]
    pub fn is_ok(self) -> bool {
        self == CrcStatus::Ok
    }
}

/// Error accumulator that latches on the first failure.
///
/// Only [`StickyFlag::reset`] clears it; later successes do not.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StickyFlag {
    failed: bool,
}

impl StickyFlag {
    pub const fn new() -> Self {
        Self { failed: false }
    }

    #[inline]
    pub fn record(&mut self, outcome: CrcStatus) {
        self.failed |= outcome == CrcStatus::Fail;
    }

    #[inline]
    pub fn reset(&mut self) {
        self.failed = false;
    }

    #[inline]
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// `Fail` once any failure has been recorded since the last reset.
    #[inline]
    pub fn status(&self) -> CrcStatus {
        if self.failed {
            CrcStatus::Fail
        } else {
            CrcStatus::Ok
        }
    }
}

/// Checksums of the most recent frame plus the sticky error flag.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Diagnostics {
    received_crc: u8,
    computed_crc: u8,
    sticky: StickyFlag,
}

impl Diagnostics {
    pub const fn new() -> Self {
        Self {
            received_crc: 0,
            computed_crc: 0,
            sticky: StickyFlag::new(),
        }
    }

    /// Validate `frame` and update the diagnostics.
    ///
    /// Frames with fewer than two bytes are rejected and leave the diagnostics untouched.
    pub fn validate(&mut self, frame: &Frame) -> Result<CrcStatus, Error> {
        if frame.len() < 2 {
            return Err(Malformed::FrameTooShort(frame.len()).into());
        }
        let computed = crc8(frame.payload())?;
        let received = !frame.crc_byte().ok_or(Malformed::FrameTooShort(0))?;

        self.received_crc = received;
        self.computed_crc = computed;

        let status = if received == computed {
            CrcStatus::Ok
        } else {
            warn!(
                "orbis: CRC mismatch, received {:#04x} computed {:#04x}",
                received, computed
            );
            CrcStatus::Fail
        };
        self.sticky.record(status);
        Ok(status)
    }

    /// Complement of the last frame's trailing byte.
    #[inline]
    pub fn received_crc(&self) -> u8 {
        self.received_crc
    }

    /// Checksum computed over the last frame's payload.
    #[inline]
    pub fn computed_crc(&self) -> u8 {
        self.computed_crc
    }

    #[inline]
    pub fn error_flag(&self) -> CrcStatus {
        self.sticky.status()
    }

    #[inline]
    pub fn reset_error_flag(&mut self) {
        self.sticky.reset();
    }

    /// Turn a `Fail` into [`Error::CrcMismatch`] carrying the last checksums.
    pub fn check(&self, status: CrcStatus) -> Result<(), Error> {
        match status {
            CrcStatus::Ok => Ok(()),
            CrcStatus::Fail => Err(Error::CrcMismatch {
                received: self.received_crc,
                computed: self.computed_crc,
            }),
        }
    }
}
