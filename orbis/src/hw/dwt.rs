// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Cortex-M7 cycle counter as the drivers' tick source.

use cortex_m::peripheral::{DCB, DWT};

use crate::hw::TickSource;

/// DWT cycle counter. Ticks at the core clock and wraps every 2^32 cycles.
pub struct CycleCounter {
    dcb: DCB,
    dwt: DWT,
    ticks_per_us: u32,
}

impl CycleCounter {
    pub fn new(mut dcb: DCB, mut dwt: DWT, sysclk_hz: u32) -> Self {
        dcb.enable_trace();
        DWT::unlock();
        dwt.enable_cycle_counter();
        Self {
            dcb,
            dwt,
            ticks_per_us: sysclk_hz / 1_000_000,
        }
    }

    #[inline]
    pub fn ticks_per_us(&self) -> u32 {
        self.ticks_per_us
    }

    pub fn free(mut self) -> (DCB, DWT) {
        self.dwt.disable_cycle_counter();
        (self.dcb, self.dwt)
    }
}

impl TickSource for CycleCounter {
    #[inline]
    fn now(&mut self) -> u32 {
        DWT::cycle_count()
    }
}
