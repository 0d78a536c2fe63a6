// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Bus and timing configuration for an Orbis encoder.
//!
//! The electrical settings are fixed by the encoder: SPI mode 1 (clock idles low, the encoder
//! loads data on the rising edge and the controller samples on the falling edge), chip-select
//! active low, 8-bit words, MSB first. What varies between deployments is captured here.

use crate::error::{ConfigError, Error};

/// Functional clock feeding the SPI controller in the reference setup.
pub const INPUT_CLOCK_HZ: u32 = 48_000_000;
/// SPI clock used with the encoder.
pub const BUS_CLOCK_HZ: u32 = 3_000_000;
/// Free-running counter ticks per microsecond (24 MHz counter).
pub const TICKS_PER_US: u32 = 24;

/// Chip-select to first clock edge on single-turn encoders.
pub const SINGLE_TURN_SETTLE_US: u32 = 8;
/// Chip-select to first clock edge on multi-turn encoders.
pub const MULTI_TURN_SETTLE_US: u32 = 25;
/// Upper bound on any single wait for the bus.
pub const DEFAULT_TIMEOUT_US: u32 = 1_000;

/// Word size of every transfer.
pub const BITS_PER_WORD: u8 = 8;
/// Value clocked out while the encoder is talking.
pub const PLACEHOLDER: u8 = 0x00;

/// Controller channel (chip-select line) the encoder is wired to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Channel(pub u8);

/// Direction of the data lines during a transaction.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Only MISO is wired. The encoder answers with position + status, no commands possible.
    ReceiveOnly,
    /// MOSI and MISO are wired. The first byte out is a command.
    TransmitReceive,
}

/// Encoder flavour, which sets the response prefix and settle delay.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Variant {
    SingleTurn,
    /// Every response is prefixed with a 16-bit turn counter.
    MultiTurn,
}

impl Variant {
    #[inline]
    pub fn settle_us(self) -> u32 {
        match self {
            Variant::SingleTurn => SINGLE_TURN_SETTLE_US,
            Variant::MultiTurn => MULTI_TURN_SETTLE_US,
        }
    }
}

/// Settings handed to [`Transport::configure`](crate::hw::Transport::configure).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusConfig {
    pub channel: Channel,
    pub direction: Direction,
    pub input_hz: u32,
    pub bus_hz: u32,
    pub bits_per_word: u8,
    /// Receive FIFO in use, with its trigger level programmed per transaction.
    pub fifo: bool,
}

/// Full acquisition configuration.
///
/// ```
/// use orbis::config::{Direction, OrbisConfig, Variant};
///
/// let cfg = OrbisConfig::default()
///     .with_direction(Direction::TransmitReceive)
///     .with_variant(Variant::MultiTurn)
///     .with_timeout_us(500);
/// assert_eq!(cfg.timeout_ticks(), 500 * 24);
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OrbisConfig {
    pub channel: Channel,
    pub direction: Direction,
    pub variant: Variant,
    pub input_hz: u32,
    pub bus_hz: u32,
    pub ticks_per_us: u32,
    pub timeout_us: u32,
}

impl Default for OrbisConfig {
    fn default() -> Self {
        Self {
            channel: Channel(0),
            direction: Direction::ReceiveOnly,
            variant: Variant::SingleTurn,
            input_hz: INPUT_CLOCK_HZ,
            bus_hz: BUS_CLOCK_HZ,
            ticks_per_us: TICKS_PER_US,
            timeout_us: DEFAULT_TIMEOUT_US,
        }
    }
}

impl OrbisConfig {
    pub fn with_channel(mut self, channel: u8) -> Self {
        self.channel = Channel(channel);
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_variant(mut self, variant: Variant) -> Self {
        self.variant = variant;
        self
    }

    /// Set the controller input clock and the requested SPI clock.
    pub fn with_clocks(mut self, input_hz: u32, bus_hz: u32) -> Self {
        self.input_hz = input_hz;
        self.bus_hz = bus_hz;
        self
    }

    pub fn with_ticks_per_us(mut self, ticks_per_us: u32) -> Self {
        self.ticks_per_us = ticks_per_us;
        self
    }

    pub fn with_timeout_us(mut self, timeout_us: u32) -> Self {
        self.timeout_us = timeout_us;
        self
    }

    /// Check the settings against a transport exposing `channels` chip-select lines.
    pub fn validate(&self, channels: u8) -> Result<(), Error> {
        if self.channel.0 >= channels {
            return Err(ConfigError::InvalidChannel(self.channel.0).into());
        }
        if self.input_hz == 0 || self.bus_hz == 0 {
            return Err(ConfigError::ZeroClock.into());
        }
        if self.bus_hz > self.input_hz / 2 {
            return Err(ConfigError::BusClockTooHigh {
                bus_hz: self.bus_hz,
                input_hz: self.input_hz,
            }
            .into());
        }
        if self.ticks_per_us == 0 {
            return Err(ConfigError::ZeroTickRate.into());
        }
        if self.timeout_us == 0 {
            return Err(ConfigError::ZeroTimeout.into());
        }
        Ok(())
    }

    /// Settle delay for this variant, in counter ticks.
    #[inline]
    pub fn settle_ticks(&self) -> u32 {
        self.variant.settle_us().saturating_mul(self.ticks_per_us)
    }

    /// Bound on a single bus wait, in counter ticks.
    #[inline]
    pub fn timeout_ticks(&self) -> u32 {
        self.timeout_us.saturating_mul(self.ticks_per_us)
    }

    pub fn bus_config(&self, fifo: bool) -> BusConfig {
        BusConfig {
            channel: self.channel,
            direction: self.direction,
            input_hz: self.input_hz,
            bus_hz: self.bus_hz,
            bits_per_word: BITS_PER_WORD,
            fifo,
        }
    }
}
