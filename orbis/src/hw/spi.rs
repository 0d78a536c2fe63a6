// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Serial Peripheral Interface (SPI) abstraction layer.
//!
//! - `SpiBus` drives SPI4 at register level and implements [`Transport`] for the Orbis drivers.
//! - `ChipSelect` is an active-low GPIO output wrapper for manual CS control.
//!
//! The STM32F7 controller differs from the model the drivers are written against in two ways,
//! both hidden here:
//!
//! - Its RX FIFO holds four 8-bit words, shorter than the longest Orbis response. In FIFO mode
//!   received words are moved into a software FIFO as they arrive, and `RX_FULL` is raised once
//!   that holds the trigger level.
//! - `RXONLY` makes the clock free-running from the moment SPE is set, which would shift words
//!   during the settle delay. Receive-only transactions therefore run full duplex with the
//!   placeholder on MOSI. After the first fill, reading a word clocks the next one until the word
//!   count is exhausted.

use core::ptr;

use heapless::Deque;
use stm32f7xx_hal::{
    gpio::{self, Output, PinState, PushPull},
    pac,
    prelude::*,
    spi,
};

use crate::config::{BusConfig, Channel, Direction, BITS_PER_WORD, PLACEHOLDER};
use crate::error::{ConfigError, Error};
use crate::frame::FRAME_CAPACITY;
use crate::hw::{IrqSources, Transport};

/// Register-level SPI4 master with one manual chip-select line.
pub struct SpiBus<const P: char, const N: u8> {
    spi: pac::SPI4,
    cs: ChipSelect<P, N>,
    direction: Direction,
    fifo: bool,
    rx: Deque<u8, FRAME_CAPACITY>,
    trigger: usize,
    remaining: usize,
    started: bool,
    irqs: IrqSources,
}

impl<const P: char, const N: u8> SpiBus<P, N> {
    /// Take SPI4 out of reset. `pins` must already be in their alternate function.
    pub fn spi4<PINS: spi::Pins<pac::SPI4>>(
        spi: pac::SPI4,
        _pins: PINS,
        cs: ChipSelect<P, N>,
    ) -> Self {
        // SAFETY: single read-modify-write of the SPI4 enable and reset bits
        let rcc = unsafe { &*pac::RCC::ptr() };
        rcc.apb2enr.modify(|_, w| w.spi4en().set_bit());
        rcc.apb2rstr.modify(|_, w| w.spi4rst().set_bit());
        rcc.apb2rstr.modify(|_, w| w.spi4rst().clear_bit());

        Self {
            spi,
            cs,
            direction: Direction::ReceiveOnly,
            fifo: false,
            rx: Deque::new(),
            trigger: 1,
            remaining: 0,
            started: false,
            irqs: IrqSources::NONE,
        }
    }

    pub fn free(self) -> (pac::SPI4, ChipSelect<P, N>) {
        (self.spi, self.cs)
    }

    #[inline]
    fn read_dr(&self) -> u8 {
        // SAFETY: 8-bit access to DR pops exactly one word from the RX FIFO
        unsafe { ptr::read_volatile(&self.spi.dr as *const _ as *const u8) }
    }

    #[inline]
    fn write_dr(&mut self, byte: u8) {
        // SAFETY: 8-bit access to DR pushes exactly one word into the TX FIFO
        unsafe { ptr::write_volatile(&self.spi.dr as *const _ as *mut u8, byte) }
    }

    /// Start one more word on the wire, if the transaction still wants one.
    fn clock_word(&mut self, byte: u8) {
        if self.remaining == 0 {
            return;
        }
        self.remaining -= 1;
        self.write_dr(byte);
    }

    /// Move received words into the software FIFO and keep the clock running.
    fn pull(&mut self) {
        while self.spi.sr.read().rxne().bit_is_set() {
            let byte = self.read_dr();
            if self.rx.push_back(byte).is_err() {
                break;
            }
            self.clock_word(PLACEHOLDER);
        }
    }

    fn wait_idle(&self) {
        while self.spi.sr.read().ftlvl().bits() != 0 {}
        while self.spi.sr.read().bsy().bit_is_set() {}
    }

    fn write_irq_enables(&mut self) {
        let tx = self.irqs.contains(IrqSources::TX_EMPTY);
        let rx = self.irqs.contains(IrqSources::RX_FULL);
        self.spi.cr2.modify(|_, w| w.txeie().bit(tx).rxneie().bit(rx));
    }
}

impl<const P: char, const N: u8> Transport for SpiBus<P, N> {
    const CHANNELS: u8 = 1;

    fn configure(&mut self, cfg: &BusConfig) -> Result<(), Error> {
        if cfg.bits_per_word != BITS_PER_WORD {
            return Err(ConfigError::Unsupported.into());
        }
        if cfg.bus_hz == 0 || cfg.input_hz == 0 {
            return Err(ConfigError::ZeroClock.into());
        }

        // Smallest power-of-two divider that keeps the bus at or below the requested rate
        let ratio = cfg.input_hz.div_ceil(cfg.bus_hz).max(2);
        let br = ratio.next_power_of_two().trailing_zeros() - 1;
        if br > 0b111 {
            return Err(ConfigError::Unsupported.into());
        }

        // Disable while configuring
        self.spi.cr1.modify(|_, w| w.spe().clear_bit());

        // Master, mode 1 (CPOL = 0, CPHA = 1), MSB first, software slave management
        self.spi.cr1.write(|w| {
            let w = unsafe { w.br().bits(br as u8) };
            w.mstr()
                .set_bit()
                .cpol()
                .clear_bit()
                .cpha()
                .set_bit()
                .lsbfirst()
                .clear_bit()
                .ssm()
                .set_bit()
                .ssi()
                .set_bit()
                .rxonly()
                .clear_bit()
        });

        // 8-bit words, RXNE on a single byte, interrupts off
        self.spi.cr2.write(|w| {
            let w = unsafe { w.ds().bits(0b0111) };
            w.frxth().set_bit().rxneie().clear_bit().txeie().clear_bit()
        });

        self.direction = cfg.direction;
        self.fifo = cfg.fifo;
        self.irqs = IrqSources::NONE;
        Ok(())
    }

    fn enable(&mut self, _ch: Channel) {
        self.rx.clear();
        self.started = false;
        self.spi.cr1.modify(|_, w| w.spe().set_bit());
    }

    fn disable(&mut self, _ch: Channel) {
        self.wait_idle();
        self.spi.cr1.modify(|_, w| w.spe().clear_bit());
    }

    fn assert_select(&mut self, _ch: Channel) {
        self.cs.select();
    }

    /// Held until the word on the wire has finished shifting.
    fn deassert_select(&mut self, _ch: Channel) {
        self.wait_idle();
        self.cs.deselect();
    }

    fn set_word_count(&mut self, n: usize) {
        self.remaining = n;
    }

    fn set_fifo_trigger_level(&mut self, n: usize) {
        self.trigger = n.clamp(1, FRAME_CAPACITY);
    }

    fn transmit(&mut self, _ch: Channel, byte: u8) {
        match (self.direction, self.fifo) {
            // Later fills only reload the placeholder; the read clocks the word
            (Direction::ReceiveOnly, false) if self.started => {}
            _ => {
                self.started = true;
                self.clock_word(byte);
            }
        }
    }

    fn receive(&mut self, _ch: Channel) -> u8 {
        if self.fifo {
            self.pull();
            return self.rx.pop_front().unwrap_or(PLACEHOLDER);
        }
        let byte = self.read_dr();
        if self.direction == Direction::ReceiveOnly && self.spi.cr1.read().spe().bit_is_set() {
            self.clock_word(PLACEHOLDER);
        }
        byte
    }

    fn transfer_complete(&mut self, _ch: Channel) -> bool {
        if self.fifo {
            self.pull();
            !self.rx.is_empty()
        } else {
            self.spi.sr.read().rxne().bit_is_set()
        }
    }

    fn interrupt_status(&mut self) -> IrqSources {
        if self.fifo {
            self.pull();
        }
        let mut pending = IrqSources::NONE;
        if self.spi.sr.read().txe().bit_is_set() {
            pending |= IrqSources::TX_EMPTY;
        }
        if self.rx.len() >= self.trigger {
            pending |= IrqSources::RX_FULL;
        }
        pending & self.irqs
    }

    fn enable_interrupt(&mut self, sources: IrqSources) {
        self.irqs |= sources;
        self.write_irq_enables();
    }

    fn disable_interrupt(&mut self, sources: IrqSources) {
        self.irqs = self.irqs.without(sources);
        self.write_irq_enables();
    }

    /// TXE and RXNE clear through DR accesses; clearing `RX_FULL` drops buffered words.
    fn clear_interrupt(&mut self, sources: IrqSources) {
        if sources.contains(IrqSources::RX_FULL) {
            self.rx.clear();
        }
    }
}

/// Manual chip-select line, active-low, generic over any GPIO pin.
pub struct ChipSelect<const P: char, const N: u8> {
    pin: gpio::Pin<P, N, Output<PushPull>>,
}

impl<const P: char, const N: u8> ChipSelect<P, N> {
    /// Create an active-low chip select and set to the inactive state (i.e., high).
    pub fn active_low<MODE>(pin: gpio::Pin<P, N, MODE>) -> Self {
        let mut pin = pin.into_push_pull_output();
        pin.set_state(PinState::High);
        Self { pin }
    }

    #[inline]
    pub fn select(&mut self) {
        self.pin.set_low();
    }

    #[inline]
    pub fn deselect(&mut self) {
        self.pin.set_high();
    }

    pub fn free(self) -> gpio::Pin<P, N, Output<PushPull>> {
        self.pin
    }
}
