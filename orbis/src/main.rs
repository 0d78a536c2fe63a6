// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Orbis acquisition firmware.
//!
//! Captures position frames from an Orbis encoder on SPI4 in a tight loop and reports every
//! capture that fails its CRC on USART1. Build with `--features irq` to let the SPI4 interrupt
//! drain each frame instead of polling.

#![no_main]
#![no_std]

use cortex_m_rt::entry;
use log::{error, info, warn, LevelFilter};
use panic_halt as _;

use hal::{
    pac,
    prelude::*,
    serial::{Config, Serial},
};
use stm32f7xx_hal as hal;

use orbis::config::{OrbisConfig, BUS_CLOCK_HZ};
use orbis::hw::usart::Console;
use orbis::hw::{ChipSelect, CycleCounter, SpiBus, Usart};
use orbis::{Command, Error, Frame, Reading};

type Bus = SpiBus<'E', 4>;

/// Report one position line per this many good captures.
const REPORT_EVERY: u32 = 10_000;

static CONSOLE: Console<pac::USART1> = Console::new();

#[entry]
fn main() -> ! {
    // Peripherals
    let dp = pac::Peripherals::take().unwrap();
    let cp = cortex_m::Peripherals::take().unwrap();

    // Clocks
    let rcc = dp.RCC.constrain();
    let clocks = rcc.cfgr.sysclk(216.MHz()).freeze();

    // GPIO
    let gpioa = dp.GPIOA.split();
    let gpioe = dp.GPIOE.split();

    // USART1 (DBG)
    let tx = gpioa.pa9.into_alternate::<7>();
    let rx = gpioa.pa10.into_alternate::<7>();
    let usart_cfg = Config {
        baud_rate: 115_200.bps(),
        ..Default::default()
    };
    let serial = Serial::new(dp.USART1, (tx, rx), &clocks, usart_cfg);
    CONSOLE.attach(Usart::new(serial));
    if log::set_logger(&CONSOLE).is_ok() {
        log::set_max_level(LevelFilter::Info);
    }

    // Tick source
    let clock = CycleCounter::new(cp.DCB, cp.DWT, clocks.sysclk().raw());

    // SPI4 + Orbis chip select
    let sck = gpioe.pe12.into_alternate::<5>();
    let miso = gpioe.pe13.into_alternate::<5>();
    let mosi = gpioe.pe14.into_alternate::<5>();
    let cs = ChipSelect::active_low(gpioe.pe4);
    let bus: Bus = SpiBus::spi4(dp.SPI4, (sck, miso, mosi), cs);

    let config = OrbisConfig::default()
        .with_clocks(clocks.pclk2().raw(), BUS_CLOCK_HZ)
        .with_ticks_per_us(clock.ticks_per_us());

    info!("orbis: acquisition starting");
    run(bus, clock, config)
}

/// Print failing captures as `VAL <frame> CRC_RX <received> CRC_CP <computed>`.
fn report(n: u32, outcome: Result<Reading, Error>, frame: &Frame) {
    match outcome {
        Ok(reading) if n % REPORT_EVERY == 0 => info!(
            "#{} position {} counts, error {} warning {}",
            n,
            reading.position.counts(),
            reading.position.error(),
            reading.position.warning()
        ),
        Ok(_) => {}
        Err(Error::CrcMismatch { received, computed }) => warn!(
            "VAL {:02X?} CRC_RX {:#04X} CRC_CP {:#04X}",
            frame.as_slice(),
            received,
            computed
        ),
        Err(e) => warn!("#{} {}", n, e),
    }
}

fn halt() -> ! {
    loop {
        cortex_m::asm::nop();
    }
}

#[cfg(not(feature = "irq"))]
fn run(bus: Bus, clock: CycleCounter, config: OrbisConfig) -> ! {
    use orbis::Orbis;

    let mut orbis = Orbis::new(bus, clock, config);
    if let Err(e) = orbis.setup() {
        error!("orbis: setup failed: {}", e);
        halt();
    }

    let mut n: u32 = 0;
    loop {
        let outcome = orbis.read(Command::Position);
        report(n, outcome, orbis.frame());
        n = n.wrapping_add(1);
    }
}

#[cfg(feature = "irq")]
mod irq {
    use core::cell::RefCell;

    use critical_section::Mutex;
    use stm32f7xx_hal::pac::{self, interrupt};

    use orbis::drivers::orbis_irq::FrameDrain;

    use super::Bus;

    pub static DRAIN: Mutex<RefCell<Option<FrameDrain<'static, Bus>>>> =
        Mutex::new(RefCell::new(None));

    #[interrupt]
    fn SPI4() {
        critical_section::with(|cs| {
            if let Some(drain) = DRAIN.borrow_ref_mut(cs).as_mut() {
                drain.on_interrupt();
            }
        });
    }

    pub fn unmask() {
        // SAFETY: DRAIN is installed before the interrupt is unmasked
        unsafe { cortex_m::peripheral::NVIC::unmask(pac::Interrupt::SPI4) };
    }
}

#[cfg(feature = "irq")]
fn run(bus: Bus, clock: CycleCounter, config: OrbisConfig) -> ! {
    use orbis::drivers::orbis_irq::{self, FrameDrain, FrameQueue, SharedLink};
    use orbis::IrqOrbis;

    let shared: &'static SharedLink<Bus> =
        cortex_m::singleton!(: SharedLink<Bus> = orbis_irq::link(bus)).unwrap();
    let queue: &'static mut FrameQueue =
        cortex_m::singleton!(: FrameQueue = FrameQueue::new()).unwrap();
    let (tx, rx) = queue.split();

    critical_section::with(|cs| {
        irq::DRAIN
            .borrow_ref_mut(cs)
            .replace(FrameDrain::new(shared, tx));
    });
    irq::unmask();

    let mut orbis = IrqOrbis::new(shared, rx, clock, config);
    if let Err(e) = orbis.setup() {
        error!("orbis: setup failed: {}", e);
        halt();
    }

    let mut n: u32 = 0;
    loop {
        let outcome = orbis.read(Command::Position);
        report(n, outcome, orbis.frame());
        n = n.wrapping_add(1);
    }
}
