// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Contract between the acquisition drivers and an SPI controller.
//!
//! The drivers never touch registers. Everything they need from the controller is expressed as a
//! `Transport`: channel enable, manual chip-select, word transmit/receive, completion status and
//! interrupt sources. Register-level operations are infallible, as on the hardware; only
//! `configure` can reject settings.

use core::ops::{BitAnd, BitOr, BitOrAssign};

use crate::config::{BusConfig, Channel};
use crate::error::Error;

/// Set of controller interrupt sources.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IrqSources(u8);

impl IrqSources {
    pub const NONE: Self = Self(0);
    /// Transmit register empty.
    pub const TX_EMPTY: Self = Self(1 << 0);
    /// Receive FIFO reached its trigger level.
    pub const RX_FULL: Self = Self(1 << 1);
    pub const ALL: Self = Self(Self::TX_EMPTY.0 | Self::RX_FULL.0);

    #[inline]
    pub fn bits(self) -> u8 {
        self.0
    }

    #[inline]
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }
}

impl BitOr for IrqSources {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitAnd for IrqSources {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl BitOrAssign for IrqSources {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// SPI controller as seen by the Orbis drivers.
pub trait Transport {
    /// Number of chip-select channels the controller exposes.
    const CHANNELS: u8;

    /// One-time controller setup: master mode, single channel, direction, SPI mode 1,
    /// chip-select active low, word size and FIFO. Must be idempotent.
    fn configure(&mut self, cfg: &BusConfig) -> Result<(), Error>;

    fn enable(&mut self, ch: Channel);
    fn disable(&mut self, ch: Channel);

    fn assert_select(&mut self, ch: Channel);
    fn deassert_select(&mut self, ch: Channel);

    /// Words the controller should clock for the next transaction.
    fn set_word_count(&mut self, n: usize);
    /// Receive FIFO level at which [`IrqSources::RX_FULL`] is raised.
    fn set_fifo_trigger_level(&mut self, n: usize);

    fn transmit(&mut self, ch: Channel, byte: u8);
    fn receive(&mut self, ch: Channel) -> u8;
    /// End of transfer: a word has been shifted and is waiting to be read.
    fn transfer_complete(&mut self, ch: Channel) -> bool;

    /// Pending sources that are also enabled.
    fn interrupt_status(&mut self) -> IrqSources;
    fn enable_interrupt(&mut self, sources: IrqSources);
    /// Disabling a source that is already disabled is a no-op.
    fn disable_interrupt(&mut self, sources: IrqSources);
    fn clear_interrupt(&mut self, sources: IrqSources);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_sets() {
        let both = IrqSources::TX_EMPTY | IrqSources::RX_FULL;
        assert_eq!(both, IrqSources::ALL);
        assert!(both.contains(IrqSources::RX_FULL));
        assert!(!IrqSources::TX_EMPTY.contains(IrqSources::RX_FULL));
        assert!(!both.contains(IrqSources::NONE));
        assert_eq!(both.without(IrqSources::TX_EMPTY), IrqSources::RX_FULL);
        assert_eq!(both & IrqSources::TX_EMPTY, IrqSources::TX_EMPTY);
        assert!(IrqSources::ALL.without(IrqSources::ALL).is_empty());
    }
}
