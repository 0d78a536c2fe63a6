// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Simulated controller and counter for host tests.

use std::collections::VecDeque;

use crate::config::{BusConfig, Channel, Direction};
use crate::error::{ConfigError, Error};
use crate::hw::{IrqSources, TickSource, Transport};

/// Counter that advances one tick per read and optionally runs a hook on every read.
///
/// The hook stands in for anything that happens "while the CPU spins", typically an interrupt.
pub struct SimClock<F: FnMut(u32) = fn(u32)> {
    start: u32,
    tick: u32,
    hook: F,
}

impl SimClock {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    pub fn starting_at(tick: u32) -> Self {
        Self {
            start: tick,
            tick,
            hook: |_| {},
        }
    }
}

impl<F: FnMut(u32)> SimClock<F> {
    pub fn with_hook(hook: F) -> Self {
        Self {
            start: 0,
            tick: 0,
            hook,
        }
    }

    pub fn elapsed(&self) -> u32 {
        self.tick.wrapping_sub(self.start)
    }
}

impl<F: FnMut(u32)> TickSource for SimClock<F> {
    fn now(&mut self) -> u32 {
        let t = self.tick;
        self.tick = t.wrapping_add(1);
        (self.hook)(t);
        t
    }
}

/// Bus operations in the order the driver issued them.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Op {
    Enable,
    Disable,
    Select,
    Deselect,
    Transmit(u8),
    Receive(u8),
}

/// Word-by-word controller without FIFO.
///
/// In receive-only mode it reproduces the controller quirk: the first TX fill after enabling
/// starts the clock, and every read of the RX register while the channel is still enabled clocks
/// one more frame. In transmit/receive mode every TX write clocks exactly one frame.
pub struct SimSpi {
    pub response: Vec<u8>,
    pub ops: Vec<Op>,
    /// Frames shifted in on the wire.
    pub clocked: usize,
    /// Writes to the TX register.
    pub fills: usize,
    pub config: Option<BusConfig>,
    pub word_count: usize,
    pub enabled: bool,
    pub selected: bool,
    /// Never complete a transfer.
    pub stalled: bool,
    /// Reject `configure`.
    pub reject: bool,
    direction: Direction,
    next: usize,
    started: bool,
    rx: Option<u8>,
}

impl SimSpi {
    pub fn new(response: &[u8]) -> Self {
        Self {
            response: response.to_vec(),
            ops: Vec::new(),
            clocked: 0,
            fills: 0,
            config: None,
            word_count: 0,
            enabled: false,
            selected: false,
            stalled: false,
            reject: false,
            direction: Direction::ReceiveOnly,
            next: 0,
            started: false,
            rx: None,
        }
    }

    pub fn stalled() -> Self {
        let mut spi = Self::new(&[]);
        spi.stalled = true;
        spi
    }

    /// Load the next response, rewinding the wire.
    pub fn respond(&mut self, response: &[u8]) {
        self.response = response.to_vec();
        self.next = 0;
        self.clocked = 0;
        self.fills = 0;
        self.ops.clear();
    }

    pub fn transmitted(&self) -> Vec<u8> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                Op::Transmit(b) => Some(*b),
                _ => None,
            })
            .collect()
    }

    fn clock_frame(&mut self) {
        if self.stalled {
            return;
        }
        self.rx = Some(self.response.get(self.next).copied().unwrap_or(0xFF));
        self.next += 1;
        self.clocked += 1;
    }
}

impl Transport for SimSpi {
    const CHANNELS: u8 = 4;

    fn configure(&mut self, cfg: &BusConfig) -> Result<(), Error> {
        if self.reject {
            return Err(ConfigError::Unsupported.into());
        }
        self.direction = cfg.direction;
        self.config = Some(*cfg);
        Ok(())
    }

    fn enable(&mut self, _ch: Channel) {
        self.ops.push(Op::Enable);
        self.enabled = true;
        self.started = false;
    }

    fn disable(&mut self, _ch: Channel) {
        self.ops.push(Op::Disable);
        self.enabled = false;
    }

    fn assert_select(&mut self, _ch: Channel) {
        self.ops.push(Op::Select);
        self.selected = true;
    }

    fn deassert_select(&mut self, _ch: Channel) {
        self.ops.push(Op::Deselect);
        self.selected = false;
    }

    fn set_word_count(&mut self, n: usize) {
        self.word_count = n;
    }

    fn set_fifo_trigger_level(&mut self, _n: usize) {}

    fn transmit(&mut self, _ch: Channel, byte: u8) {
        self.ops.push(Op::Transmit(byte));
        self.fills += 1;
        match self.direction {
            Direction::TransmitReceive => self.clock_frame(),
            Direction::ReceiveOnly if !self.started => {
                self.started = true;
                self.clock_frame();
            }
            Direction::ReceiveOnly => {}
        }
    }

    fn receive(&mut self, _ch: Channel) -> u8 {
        let b = self.rx.take().unwrap_or(0);
        self.ops.push(Op::Receive(b));
        if self.direction == Direction::ReceiveOnly && self.enabled {
            self.clock_frame();
        }
        b
    }

    fn transfer_complete(&mut self, _ch: Channel) -> bool {
        self.rx.is_some()
    }

    fn interrupt_status(&mut self) -> IrqSources {
        IrqSources::NONE
    }

    fn enable_interrupt(&mut self, _sources: IrqSources) {}

    fn disable_interrupt(&mut self, _sources: IrqSources) {}

    fn clear_interrupt(&mut self, _sources: IrqSources) {}
}

/// FIFO controller for interrupt-driven capture.
///
/// The first TX write after enabling makes the encoder answer with the whole of `response`,
/// which lands in the receive FIFO.
pub struct SimFifoSpi {
    pub response: Vec<u8>,
    pub sent: Vec<u8>,
    pub fifo: VecDeque<u8>,
    pub trigger: usize,
    pub enabled_irqs: IrqSources,
    pub cleared: IrqSources,
    pub config: Option<BusConfig>,
    pub enabled: bool,
    pub selected: bool,
    /// The encoder never answers.
    pub stalled: bool,
    tx_pending: bool,
}

impl SimFifoSpi {
    pub fn new(response: &[u8]) -> Self {
        Self {
            response: response.to_vec(),
            sent: Vec::new(),
            fifo: VecDeque::new(),
            trigger: 1,
            enabled_irqs: IrqSources::NONE,
            cleared: IrqSources::NONE,
            config: None,
            enabled: false,
            selected: false,
            stalled: false,
            tx_pending: false,
        }
    }

    pub fn stalled() -> Self {
        let mut spi = Self::new(&[]);
        spi.stalled = true;
        spi
    }

    pub fn irq_armed(&self) -> bool {
        !self.enabled_irqs.is_empty()
    }
}

impl Transport for SimFifoSpi {
    const CHANNELS: u8 = 1;

    fn configure(&mut self, cfg: &BusConfig) -> Result<(), Error> {
        self.config = Some(*cfg);
        Ok(())
    }

    fn enable(&mut self, _ch: Channel) {
        self.enabled = true;
        self.tx_pending = false;
    }

    fn disable(&mut self, _ch: Channel) {
        self.enabled = false;
    }

    fn assert_select(&mut self, _ch: Channel) {
        self.selected = true;
    }

    fn deassert_select(&mut self, _ch: Channel) {
        self.selected = false;
    }

    fn set_word_count(&mut self, _n: usize) {}

    fn set_fifo_trigger_level(&mut self, n: usize) {
        self.trigger = n;
    }

    fn transmit(&mut self, _ch: Channel, byte: u8) {
        self.sent.push(byte);
        if !self.tx_pending && !self.stalled && self.enabled && self.selected {
            self.tx_pending = true;
            self.fifo.extend(self.response.iter().copied());
        }
    }

    fn receive(&mut self, _ch: Channel) -> u8 {
        self.fifo.pop_front().unwrap_or(0)
    }

    fn transfer_complete(&mut self, _ch: Channel) -> bool {
        !self.fifo.is_empty()
    }

    fn interrupt_status(&mut self) -> IrqSources {
        let mut pending = IrqSources::NONE;
        if self.enabled && !self.tx_pending {
            pending |= IrqSources::TX_EMPTY;
        }
        if self.fifo.len() >= self.trigger {
            pending |= IrqSources::RX_FULL;
        }
        pending & self.enabled_irqs
    }

    fn enable_interrupt(&mut self, sources: IrqSources) {
        self.enabled_irqs |= sources;
    }

    fn disable_interrupt(&mut self, sources: IrqSources) {
        self.enabled_irqs = self.enabled_irqs.without(sources);
    }

    fn clear_interrupt(&mut self, sources: IrqSources) {
        self.cleared |= sources;
    }
}
