// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Error type shared by the CRC engine, the frame buffer and both acquisition drivers.

use thiserror::Error;

/// Every way an Orbis transaction can go wrong.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A response arrived but its checksum does not match. Recoverable, the caller may retry.
    #[error("CRC mismatch (received {received:#04x}, computed {computed:#04x})")]
    CrcMismatch { received: u8, computed: u8 },

    /// Rejected before any computation took place.
    #[error("malformed request: {0}")]
    MalformedRequest(Malformed),

    /// The bus never reached the awaited state. Retryable.
    #[error("timed out waiting for {0}")]
    Timeout(WaitFor),

    /// The cancellation token fired while waiting on the bus.
    #[error("wait cancelled")]
    Cancelled,

    /// Another transaction is still in flight on the same link.
    #[error("a transaction is already in flight")]
    Busy,

    /// Setup parameters are invalid, or capture was called before setup. Fatal.
    #[error("configuration error: {0}")]
    Configuration(ConfigError),
}

/// Detail for [`Error::MalformedRequest`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Malformed {
    #[error("CRC over an empty buffer")]
    EmptyInput,
    #[error("frame of {0} bytes has no payload before its CRC")]
    FrameTooShort(usize),
    #[error("frame capacity exceeded")]
    FrameFull,
    #[error("expected a {expected}-byte response, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
}

/// What a bounded wait was waiting for.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WaitFor {
    #[error("transfer complete")]
    TransferComplete,
    #[error("frame ready")]
    FrameReady,
}

/// Detail for [`Error::Configuration`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    #[error("channel {0} does not exist on this transport")]
    InvalidChannel(u8),
    #[error("clock frequency is zero")]
    ZeroClock,
    #[error("bus clock {bus_hz} Hz exceeds half the input clock {input_hz} Hz")]
    BusClockTooHigh { bus_hz: u32, input_hz: u32 },
    #[error("tick rate is zero")]
    ZeroTickRate,
    #[error("timeout is zero")]
    ZeroTimeout,
    #[error("command {0:#04x} needs a transmit-capable bus")]
    CommandNeedsTransmit(u8),
    #[error("transport rejected the bus settings")]
    Unsupported,
    #[error("capture called before setup")]
    NotSetUp,
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Configuration(e)
    }
}

impl From<Malformed> for Error {
    fn from(e: Malformed) -> Self {
        Error::MalformedRequest(e)
    }
}
