// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Interrupt-driven driver for an RLS Orbis absolute rotary encoder.
//!
//! The work of one transaction is split between two owners:
//!
//! - [`IrqOrbis`] lives in the calling context. It records the transaction in the shared
//!   [`Link`], asserts chip-select, arms the interrupt sources and then waits for the frame.
//! - [`FrameDrain`] lives in the SPI interrupt handler. On TX-empty it writes the command byte;
//!   on RX-full it drains exactly the expected number of words into a fresh [`Frame`] and hands
//!   it over through a single-slot SPSC queue.
//!
//! Each shared field has exactly one writer per transaction. The consumer writes the armed
//! transaction before enabling any interrupt source and clears it only after disabling them.
//! The producer only reads it, and builds the frame in storage it owns until the frame is
//! queued. A frame is therefore never visible to the consumer before it is complete.
//!
//! Frames carry a sequence number, so a frame that arrives after its transaction timed out is
//! discarded instead of being mistaken for the next response.
//!
//! ```no_run
//! # use orbis::drivers::orbis_irq::*;
//! # use orbis::config::OrbisConfig;
//! # fn demo<T: orbis::hw::Transport, C: orbis::hw::TickSource>(spi: T, clock: C) {
//! let link = link(spi);
//! let mut queue = FrameQueue::new();
//! let (tx, rx) = queue.split();
//!
//! // Hand `drain` to the interrupt handler and call `drain.on_interrupt()` from it.
//! let drain = FrameDrain::new(&link, tx);
//! let mut orbis = IrqOrbis::new(&link, rx, clock, OrbisConfig::default());
//! orbis.setup().unwrap();
//! # }
//! ```

use core::cell::RefCell;

use critical_section::Mutex;
use heapless::spsc::{Consumer, Producer, Queue};
use log::{debug, warn};

use crate::config::{Channel, Direction, OrbisConfig};
use crate::drivers::orbis::State;
use crate::error::{ConfigError, Error, WaitFor};
use crate::frame::{CrcStatus, Diagnostics, Frame};
use crate::hw::delay::{self, CancelToken, TickSource};
use crate::hw::{IrqSources, Transport};
use crate::protocol::{parse, Command, Reading, Transaction};

/// Queue storage size. One slot is usable: at most one completed frame is ever outstanding.
pub const QUEUE_LEN: usize = 2;

pub type FrameQueue = Queue<FrameEvent, QUEUE_LEN>;
pub type SharedLink<T> = Mutex<RefCell<Link<T>>>;

/// A completed frame tagged with the transaction it answers.
#[derive(Clone, Debug)]
pub struct FrameEvent {
    seq: u16,
    frame: Frame,
}

/// Transaction parameters written by the consumer before arming, read by the interrupt side.
#[derive(Copy, Clone, Debug)]
struct Armed {
    seq: u16,
    channel: Channel,
    len: usize,
    command: u8,
}

/// State shared between the calling context and the interrupt handler.
pub struct Link<T> {
    spi: T,
    armed: Option<Armed>,
}

impl<T> Link<T> {
    pub const fn new(spi: T) -> Self {
        Self { spi, armed: None }
    }

    #[inline]
    pub fn transport(&self) -> &T {
        &self.spi
    }

    /// Mutable access to the transport, refused while a transaction is in flight.
    pub fn transport_mut(&mut self) -> Option<&mut T> {
        match self.armed {
            Some(_) => None,
            None => Some(&mut self.spi),
        }
    }

    #[inline]
    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    pub fn free(self) -> T {
        self.spi
    }
}

/// Wrap `spi` for sharing with an interrupt handler.
pub const fn link<T>(spi: T) -> SharedLink<T> {
    Mutex::new(RefCell::new(Link::new(spi)))
}

/// Interrupt-side half: drains the controller into frames.
pub struct FrameDrain<'a, T> {
    link: &'a SharedLink<T>,
    frames: Producer<'a, FrameEvent, QUEUE_LEN>,
    served: Option<u16>,
}

impl<'a, T: Transport> FrameDrain<'a, T> {
    pub fn new(link: &'a SharedLink<T>, frames: Producer<'a, FrameEvent, QUEUE_LEN>) -> Self {
        Self {
            link,
            frames,
            served: None,
        }
    }

    /// Service the controller. Call from the SPI interrupt handler.
    pub fn on_interrupt(&mut self) {
        let frames = &mut self.frames;
        let served = &mut self.served;
        critical_section::with(|cs| {
            let mut link = self.link.borrow_ref_mut(cs);
            let Link { spi, armed } = &mut *link;

            let pending = spi.interrupt_status();
            if pending.is_empty() {
                return;
            }

            // Nothing armed: a leftover source from an abandoned transaction
            let Some(armed) = *armed else {
                spi.disable_interrupt(IrqSources::ALL);
                spi.clear_interrupt(pending);
                return;
            };

            if pending.contains(IrqSources::TX_EMPTY) {
                spi.transmit(armed.channel, armed.command);
                spi.disable_interrupt(IrqSources::TX_EMPTY);
                spi.clear_interrupt(IrqSources::TX_EMPTY);
            }

            if pending.contains(IrqSources::RX_FULL) {
                if *served != Some(armed.seq) {
                    let mut frame = Frame::new();
                    for _ in 0..armed.len {
                        if frame.push(spi.receive(armed.channel)).is_err() {
                            break;
                        }
                    }
                    *served = Some(armed.seq);
                    let event = FrameEvent {
                        seq: armed.seq,
                        frame,
                    };
                    if frames.enqueue(event).is_err() {
                        warn!("orbis: frame {} dropped, consumer behind", armed.seq);
                    }
                }
                spi.disable_interrupt(IrqSources::RX_FULL);
                spi.clear_interrupt(IrqSources::RX_FULL);
            }
        });
    }
}

/// Calling-context half: runs transactions and owns the diagnostics.
pub struct IrqOrbis<'a, T, C> {
    link: &'a SharedLink<T>,
    frames: Consumer<'a, FrameEvent, QUEUE_LEN>,
    clock: C,
    config: OrbisConfig,
    cancel: Option<&'static CancelToken>,
    frame: Frame,
    diag: Diagnostics,
    state: State,
    seq: u16,
    set_up: bool,
}

impl<'a, T, C> IrqOrbis<'a, T, C>
where
    T: Transport,
    C: TickSource,
{
    pub fn new(
        link: &'a SharedLink<T>,
        frames: Consumer<'a, FrameEvent, QUEUE_LEN>,
        clock: C,
        config: OrbisConfig,
    ) -> Self {
        Self {
            link,
            frames,
            clock,
            config,
            cancel: None,
            frame: Frame::new(),
            diag: Diagnostics::new(),
            state: State::Idle,
            seq: 0,
            set_up: false,
        }
    }

    /// Abort the frame wait when `token` is cancelled.
    pub fn with_cancel(mut self, token: &'static CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Validate the configuration and program the controller with its FIFO enabled.
    pub fn setup(&mut self) -> Result<(), Error> {
        self.set_up = false;
        self.config.validate(T::CHANNELS)?;
        let bus = self.config.bus_config(true);
        critical_section::with(|cs| {
            let mut link = self.link.borrow_ref_mut(cs);
            if link.is_armed() {
                return Err(Error::Busy);
            }
            link.spi.configure(&bus)?;
            link.spi.disable_interrupt(IrqSources::ALL);
            link.spi.clear_interrupt(IrqSources::ALL);
            Ok(())
        })?;
        self.state = State::Idle;
        self.set_up = true;
        debug!(
            "orbis: channel {} ready for interrupt capture",
            self.config.channel.0
        );
        Ok(())
    }

    /// Run one transaction and report the CRC outcome.
    ///
    /// Fails fast with [`Error::Busy`] if another transaction is armed on the same link.
    pub fn capture(&mut self, command: Command) -> Result<CrcStatus, Error> {
        if !self.set_up {
            return Err(ConfigError::NotSetUp.into());
        }
        if self.config.direction == Direction::ReceiveOnly && command != Command::Position {
            return Err(ConfigError::CommandNeedsTransmit(command.code()).into());
        }

        let txn = Transaction::new(command, &self.config);
        let ch = self.config.channel;
        let seq = self.seq.wrapping_add(1);

        // Anything still queued answers a transaction that already gave up
        while let Some(stale) = self.frames.dequeue() {
            debug!("orbis: discarding stale frame {}", stale.seq);
        }

        let armed = Armed {
            seq,
            channel: ch,
            len: txn.len,
            command: txn.command.code(),
        };
        critical_section::with(|cs| {
            let mut link = self.link.borrow_ref_mut(cs);
            if link.is_armed() {
                return Err(Error::Busy);
            }
            link.armed = Some(armed);
            link.spi.set_word_count(txn.len);
            link.spi.set_fifo_trigger_level(txn.len);
            link.spi.enable(ch);
            link.spi.assert_select(ch);
            Ok(())
        })
        .inspect_err(|_| warn!("orbis: {:?} refused, link busy", command))?;
        self.seq = seq;
        self.state = State::CsAsserted;
        delay::wait_ticks(&mut self.clock, txn.settle_ticks);

        critical_section::with(|cs| {
            let mut link = self.link.borrow_ref_mut(cs);
            link.spi.clear_interrupt(IrqSources::ALL);
            link.spi.enable_interrupt(IrqSources::ALL);
        });
        self.state = State::Transferring;

        let frames = &mut self.frames;
        let mut received = None;
        let waited = delay::wait_until(
            &mut self.clock,
            self.config.timeout_ticks(),
            self.cancel,
            WaitFor::FrameReady,
            || {
                while let Some(event) = frames.dequeue() {
                    if event.seq == seq {
                        received = Some(event.frame);
                        return true;
                    }
                }
                false
            },
        );

        critical_section::with(|cs| {
            let mut link = self.link.borrow_ref_mut(cs);
            link.spi.disable_interrupt(IrqSources::ALL);
            link.spi.deassert_select(ch);
            link.spi.disable(ch);
            link.armed = None;
        });
        self.state = State::CsDeasserted;

        let frame = match waited.and_then(|()| received.ok_or(Error::Timeout(WaitFor::FrameReady)))
        {
            Ok(frame) => frame,
            Err(e) => {
                warn!("orbis: {:?} aborted: {}", command, e);
                self.state = State::Idle;
                return Err(e);
            }
        };

        self.frame = frame;
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

    #[inline]
    pub fn state(&self) -> State {
        self.state
    }

    #[inline]
    pub fn config(&self) -> &OrbisConfig {
        &self.config
    }

    /// Most recent complete response, CRC byte last.
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

    #[inline]
    pub fn error_flag(&self) -> CrcStatus {
        self.diag.error_flag()
    }

    pub fn reset_error_flag(&mut self) {
        self.diag.reset_error_flag();
    }
}
