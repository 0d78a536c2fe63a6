// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Polling driver for an RLS Orbis absolute rotary encoder.
//!
//! One call to [`Orbis::capture`] runs a complete transaction:
//!
//! 1. program the word count and enable the channel,
//! 2. assert chip-select and wait for the encoder to settle,
//! 3. shift the response in word by word, spinning on end-of-transfer,
//! 4. deassert chip-select and disable the channel,
//! 5. validate the CRC.
//!
//! Every spin is bounded by the configured timeout and can be cut short by a [`CancelToken`].
//! The session owns the transport, the last frame and the diagnostics; nothing is global.

use log::{debug, warn};

use crate::config::{Direction, OrbisConfig, PLACEHOLDER};
use crate::error::{ConfigError, Error, WaitFor};
use crate::frame::{CrcStatus, Diagnostics, Frame};
use crate::hw::delay::{self, CancelToken, TickSource};
use crate::hw::{IrqSources, Transport};
use crate::protocol::{parse, Command, Reading, Transaction};

/// Where a transaction currently is. Observable for diagnostics.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    Idle,
    Configured,
    CsAsserted,
    Transferring,
    CsDeasserted,
    Validated,
}

/// Polling acquisition session bound to one transport and one tick source.
pub struct Orbis<T, C> {
    spi: T,
    clock: C,
    config: OrbisConfig,
    cancel: Option<&'static CancelToken>,
    frame: Frame,
    diag: Diagnostics,
    state: State,
    set_up: bool,
}

impl<T, C> Orbis<T, C>
where
    T: Transport,
    C: TickSource,
{
    pub fn new(spi: T, clock: C, config: OrbisConfig) -> Self {
        Self {
            spi,
            clock,
            config,
            cancel: None,
            frame: Frame::new(),
            diag: Diagnostics::new(),
            state: State::Idle,
            set_up: false,
        }
    }

    /// Abort bus waits when `token` is cancelled.
    pub fn with_cancel(mut self, token: &'static CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Tear down the session and return the transport and tick source.
    pub fn free(self) -> (T, C) {
        (self.spi, self.clock)
    }

    /// Validate the configuration and program the controller. Safe to call again.
    pub fn setup(&mut self) -> Result<(), Error> {
        self.set_up = false;
        self.config.validate(T::CHANNELS)?;
        self.spi.configure(&self.config.bus_config(false))?;
        self.spi.clear_interrupt(IrqSources::ALL);
        self.state = State::Idle;
        self.set_up = true;
        debug!(
            "orbis: channel {} ready ({:?}, {} Hz)",
            self.config.channel.0, self.config.direction, self.config.bus_hz
        );
        Ok(())
    }

    /// Run one transaction and report the CRC outcome.
    ///
    /// A CRC failure is not an error here: it is returned as [`CrcStatus::Fail`] and latched in
    /// the sticky flag. Bus failures are returned as errors after chip-select has been released.
    pub fn capture(&mut self, command: Command) -> Result<CrcStatus, Error> {
        if !self.set_up {
            return Err(ConfigError::NotSetUp.into());
        }
        if self.config.direction == Direction::ReceiveOnly && command != Command::Position {
            return Err(ConfigError::CommandNeedsTransmit(command.code()).into());
        }

        let txn = Transaction::new(command, &self.config);
        let ch = self.config.channel;
        self.frame.clear();

        self.spi.set_word_count(txn.len);
        self.spi.enable(ch);
        self.state = State::Configured;

        self.spi.assert_select(ch);
        self.state = State::CsAsserted;
        delay::wait_ticks(&mut self.clock, txn.settle_ticks);

        self.state = State::Transferring;
        let shifted = match self.config.direction {
            Direction::TransmitReceive => self.shift_duplex(&txn),
            Direction::ReceiveOnly => self.shift_rx_only(&txn),
        };

        self.spi.deassert_select(ch);
        self.spi.disable(ch);
        self.state = State::CsDeasserted;

        // Receive-only: the last word is already in the RX register, read it with the channel off
        let shifted = match (shifted, self.config.direction) {
            (Ok(()), Direction::ReceiveOnly) => self.read_word(),
            (other, _) => other,
        };
        if let Err(e) = shifted {
            warn!("orbis: {:?} aborted: {}", command, e);
            self.state = State::Idle;
            return Err(e);
        }

        let status = self.diag.validate(&self.frame)?;
        self.state = State::Validated;
        debug!("orbis: {:?} -> {:?}", self.frame.as_slice(), status);
        Ok(status)
    }

    /// Capture, validate and parse. A CRC failure becomes [`Error::CrcMismatch`].
    pub fn read(&mut self, command: Command) -> Result<Reading, Error> {
        let status = self.capture(command)?;
        self.diag.check(status)?;
        parse(command, self.config.variant, &self.frame)
    }

    /// Command byte first, then one placeholder per remaining word. Reads exactly `len` words.
    fn shift_duplex(&mut self, txn: &Transaction) -> Result<(), Error> {
        let ch = self.config.channel;
        for i in 0..txn.len {
            let out = if i == 0 {
                txn.command.code()
            } else {
                PLACEHOLDER
            };
            self.spi.transmit(ch, out);
            self.read_word()?;
        }
        Ok(())
    }

    /// Reads `len - 1` words. In receive-only mode, emptying the RX register while the channel is
    /// enabled clocks another word, so the final word must be read after the channel is disabled.
    fn shift_rx_only(&mut self, txn: &Transaction) -> Result<(), Error> {
        let ch = self.config.channel;
        for _ in 0..txn.len - 1 {
            self.spi.transmit(ch, PLACEHOLDER);
            self.read_word()?;
        }
        Ok(())
    }

    fn read_word(&mut self) -> Result<(), Error> {
        let ch = self.config.channel;
        let spi = &mut self.spi;
        delay::wait_until(
            &mut self.clock,
            self.config.timeout_ticks(),
            self.cancel,
            WaitFor::TransferComplete,
            || spi.transfer_complete(ch),
        )?;
        self.frame.push(self.spi.receive(ch))
    }

    #[inline]
    pub fn state(&self) -> State {
        self.state
    }

    #[inline]
    pub fn config(&self) -> &OrbisConfig {
        &self.config
    }

    /// Most recent response, CRC byte last.
    #[inline]
    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    #[inline]
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diag
    }

    #[inline]
    pub fn received_crc(&self) -> u8 {
        self.diag.received_crc()
    }

    #[inline]
    pub fn computed_crc(&self) -> u8 {
        self.diag.computed_crc()
    }

    /// Sticky: `Fail` once any capture has failed since the last reset.
    #[inline]
    pub fn error_flag(&self) -> CrcStatus {
        self.diag.error_flag()
    }

    pub fn reset_error_flag(&mut self) {
        self.diag.reset_error_flag();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Variant;
    use crate::crc::crc8;
    use crate::error::Malformed;
    use crate::protocol::Extra;
    use crate::test_support::{Op, SimClock, SimSpi};

    fn with_crc(payload: &[u8]) -> Vec<u8> {
        let mut v = payload.to_vec();
        v.push(!crc8(payload).unwrap());
        v
    }

    fn session(spi: SimSpi, config: OrbisConfig) -> Orbis<SimSpi, SimClock> {
        let mut orbis = Orbis::new(spi, SimClock::new(), config);
        orbis.setup().unwrap();
        orbis
    }

    fn rx_only(response: &[u8]) -> Orbis<SimSpi, SimClock> {
        session(SimSpi::new(response), OrbisConfig::default())
    }

    fn duplex(response: &[u8]) -> Orbis<SimSpi, SimClock> {
        session(
            SimSpi::new(response),
            OrbisConfig::default().with_direction(Direction::TransmitReceive),
        )
    }

    #[test]
    fn setup_programs_controller() {
        let orbis = rx_only(&[]);
        let (spi, _) = orbis.free();
        let cfg = spi.config.unwrap();
        assert_eq!(cfg.direction, Direction::ReceiveOnly);
        assert_eq!(cfg.bits_per_word, 8);
        assert!(!cfg.fifo);
    }

    #[test]
    fn setup_is_idempotent() {
        let mut orbis = rx_only(&with_crc(&[0x12, 0x34]));
        orbis.setup().unwrap();
        orbis.setup().unwrap();
        assert_eq!(orbis.capture(Command::Position), Ok(CrcStatus::Ok));
    }

    #[test]
    fn capture_before_setup_is_rejected() {
        let mut orbis = Orbis::new(SimSpi::new(&[]), SimClock::new(), OrbisConfig::default());
        assert_eq!(
            orbis.capture(Command::Position),
            Err(Error::Configuration(ConfigError::NotSetUp))
        );
    }

    #[test]
    fn setup_rejects_bad_channel() {
        let cfg = OrbisConfig::default().with_channel(7);
        let mut orbis = Orbis::new(SimSpi::new(&[]), SimClock::new(), cfg);
        assert_eq!(
            orbis.setup(),
            Err(Error::Configuration(ConfigError::InvalidChannel(7)))
        );
        assert_eq!(
            orbis.capture(Command::Position),
            Err(Error::Configuration(ConfigError::NotSetUp))
        );
    }

    #[test]
    fn setup_surfaces_transport_rejection() {
        let mut spi = SimSpi::new(&[]);
        spi.reject = true;
        let mut orbis = Orbis::new(spi, SimClock::new(), OrbisConfig::default());
        assert_eq!(
            orbis.setup(),
            Err(Error::Configuration(ConfigError::Unsupported))
        );
    }

    #[test]
    fn rx_only_good_frame() {
        let response = with_crc(&[0x12, 0x34]);
        let mut orbis = rx_only(&response);

        assert_eq!(orbis.capture(Command::Position), Ok(CrcStatus::Ok));
        assert_eq!(orbis.frame().as_slice(), response.as_slice());
        assert_eq!(orbis.received_crc(), orbis.computed_crc());
        assert_eq!(orbis.error_flag(), CrcStatus::Ok);
        assert_eq!(orbis.state(), State::Validated);
    }

    #[test]
    fn rx_only_reads_last_word_with_channel_off() {
        let mut orbis = rx_only(&with_crc(&[0x12, 0x34]));
        orbis.capture(Command::Position).unwrap();
        let (spi, _) = orbis.free();

        assert_eq!(spi.fills, 2);
        assert_eq!(spi.clocked, 3);
        assert_eq!(
            spi.ops,
            [
                Op::Enable,
                Op::Select,
                Op::Transmit(0x00),
                Op::Receive(0x12),
                Op::Transmit(0x00),
                Op::Receive(0x34),
                Op::Deselect,
                Op::Disable,
                Op::Receive(0x6D),
            ]
        );
    }

    #[test]
    fn rx_only_rejects_commands() {
        let mut orbis = rx_only(&[]);
        assert_eq!(
            orbis.capture(Command::Speed),
            Err(Error::Configuration(ConfigError::CommandNeedsTransmit(b'v')))
        );
    }

    #[test]
    fn duplex_sends_command_then_placeholders() {
        let payload = [0x40, 0x03, 0x01, 0xF4];
        let response = with_crc(&payload);
        let mut orbis = duplex(&response);

        assert_eq!(orbis.capture(Command::Speed), Ok(CrcStatus::Ok));
        assert_eq!(orbis.frame().as_slice(), response.as_slice());

        let (spi, _) = orbis.free();
        assert_eq!(spi.transmitted(), [b'v', 0x00, 0x00, 0x00, 0x00]);
        assert_eq!(spi.clocked, 5);
        assert_eq!(spi.word_count, 5);
        assert_eq!(spi.ops.first(), Some(&Op::Enable));
        assert_eq!(spi.ops[1], Op::Select);
        assert_eq!(spi.ops[spi.ops.len() - 2..], [Op::Deselect, Op::Disable]);
    }

    #[test]
    fn bad_crc_is_reported_and_latched() {
        let mut orbis = rx_only(&[0x12, 0x34, 0x00]);
        assert_eq!(orbis.capture(Command::Position), Ok(CrcStatus::Fail));
        assert_eq!(orbis.received_crc(), 0xFF);
        assert_eq!(orbis.computed_crc(), 0x92);
        assert_eq!(orbis.error_flag(), CrcStatus::Fail);

        orbis.spi.respond(&with_crc(&[0x12, 0x34]));
        assert_eq!(orbis.capture(Command::Position), Ok(CrcStatus::Ok));
        assert_eq!(orbis.error_flag(), CrcStatus::Fail);

        orbis.reset_error_flag();
        assert_eq!(orbis.error_flag(), CrcStatus::Ok);
    }

    #[test]
    fn read_parses_good_frames() {
        let mut orbis = session(
            SimSpi::new(&with_crc(&[0x00, 0x02, 0x40, 0x03, 0x00, 0xFA])),
            OrbisConfig::default()
                .with_direction(Direction::TransmitReceive)
                .with_variant(Variant::MultiTurn),
        );
        let reading = orbis.read(Command::Temperature).unwrap();
        assert_eq!(reading.turns, Some(2));
        assert_eq!(reading.position.counts(), 0x1000);
        assert_eq!(reading.extra, Extra::Temperature(250));
    }

    #[test]
    fn read_turns_crc_failure_into_error() {
        let mut orbis = rx_only(&[0x12, 0x34, 0x00]);
        assert_eq!(
            orbis.read(Command::Position),
            Err(Error::CrcMismatch {
                received: 0xFF,
                computed: 0x92
            })
        );
    }

    #[test]
    fn stalled_bus_times_out_and_releases_cs() {
        let mut orbis = session(SimSpi::stalled(), OrbisConfig::default().with_timeout_us(10));
        assert_eq!(
            orbis.capture(Command::Position),
            Err(Error::Timeout(WaitFor::TransferComplete))
        );
        assert_eq!(orbis.state(), State::Idle);

        let (spi, _) = orbis.free();
        assert!(!spi.selected);
        assert!(!spi.enabled);
    }

    #[test]
    fn cancelled_wait_releases_cs() {
        static TOKEN: CancelToken = CancelToken::new();
        TOKEN.cancel();

        let mut orbis = session(SimSpi::stalled(), OrbisConfig::default()).with_cancel(&TOKEN);
        assert_eq!(orbis.capture(Command::Position), Err(Error::Cancelled));
        let (spi, _) = orbis.free();
        assert!(!spi.selected);
    }

    #[test]
    fn settle_delay_precedes_first_word() {
        let mut orbis = rx_only(&with_crc(&[0x12, 0x34]));
        orbis.capture(Command::Position).unwrap();
        let settle = orbis.config().settle_ticks();
        let (_, clock) = orbis.free();
        assert!(clock.elapsed() > settle);
    }

    #[test]
    fn frame_overflow_is_malformed() {
        // Every response fits a frame, so force one that does not by asking for more words than
        // the buffer holds.
        let mut orbis = duplex(&[0u8; 16]);
        orbis.frame = Frame::from_slice(&[0u8; 10]).unwrap();
        let txn = Transaction {
            command: Command::Position,
            len: 3,
            settle_ticks: 0,
        };
        orbis.spi.enable(orbis.config.channel);
        assert_eq!(
            orbis.shift_duplex(&txn),
            Err(Error::MalformedRequest(Malformed::FrameFull))
        );
    }
}
