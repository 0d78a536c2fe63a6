// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! USART abstraction layer.
//!
//! `Usart` writes bytes and strings to the attached debug terminal. `Console` owns one and
//! installs it as the `log` backend, so driver diagnostics and capture reports end up on the
//! same terminal.
//!
//! To access the terminal on the host machine, connect to the debug USB port and use
//! ```text
//! $ screen /dev/tty.usbmodem* <baud_rate>
//! ```
//!
//! To close the debug terminal, press `Ctrl+A` then `Ctrl+\` then `y`.

use core::cell::RefCell;
use core::fmt::{self, Write as _};

use critical_section::Mutex;
use nb::block;

use stm32f7xx_hal::{
    prelude::*,
    serial::{Instance, Pins, Serial, Tx},
};

pub struct Usart<U: Instance> {
    tx: Tx<U>,
}

impl<U: Instance> Usart<U> {
    pub fn new<PINS: Pins<U>>(serial: Serial<U, PINS>) -> Self {
        let (tx, _rx) = serial.split();
        Self { tx }
    }

    #[inline]
    pub fn write_byte(&mut self, b: u8) {
        let _ = block!(self.tx.write(b));
    }

    pub fn write_str(&mut self, s: &str) {
        for &b in s.as_bytes() {
            self.write_byte(b);
        }
    }

    /// Write string and CRLF terminator.
    #[inline]
    pub fn println(&mut self, s: &str) {
        self.write_str(s);
        self.write_str("\r\n");
    }

    /// Block until the hardware TX FIFO/drain is flushed.
    #[inline]
    pub fn flush(&mut self) {
        let _ = block!(self.tx.flush());
    }
}

impl<U: Instance> fmt::Write for Usart<U> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        Usart::write_str(self, s);
        Ok(())
    }
}

/// `log` backend writing `[LEVEL] message` lines to a USART.
///
/// Records logged before [`Console::attach`] are dropped.
pub struct Console<U: Instance> {
    usart: Mutex<RefCell<Option<Usart<U>>>>,
}

impl<U: Instance> Console<U> {
    pub const fn new() -> Self {
        Self {
            usart: Mutex::new(RefCell::new(None)),
        }
    }

    pub fn attach(&self, usart: Usart<U>) {
        critical_section::with(|cs| {
            self.usart.borrow_ref_mut(cs).replace(usart);
        });
    }
}

impl<U: Instance> log::Log for Console<U>
where
    Usart<U>: Send,
{
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        critical_section::with(|cs| {
            if let Some(usart) = self.usart.borrow_ref_mut(cs).as_mut() {
                let _ = write!(usart, "[{}] {}\r\n", record.level(), record.args());
            }
        });
    }

    fn flush(&self) {
        critical_section::with(|cs| {
            if let Some(usart) = self.usart.borrow_ref_mut(cs).as_mut() {
                usart.flush();
            }
        });
    }
}
