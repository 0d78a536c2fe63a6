// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Delays and bounded waits on a free-running counter.
//!
//! The counter is a wrapping `u32`. Elapsed time is always computed with `wrapping_sub`, so a
//! wait that straddles the overflow behaves like any other.

use core::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Error, WaitFor};

/// Free-running tick counter.
pub trait TickSource {
    fn now(&mut self) -> u32;
}

/// Busy-wait for `ticks` counter ticks.
pub fn wait_ticks<C: TickSource>(clock: &mut C, ticks: u32) {
    let t0 = clock.now();
    while clock.now().wrapping_sub(t0) < ticks {
        core::hint::spin_loop();
    }
}

/// A point in the future on the counter.
#[derive(Copy, Clone, Debug)]
pub struct Deadline {
    start: u32,
    ticks: u32,
}

impl Deadline {
    pub fn after<C: TickSource>(clock: &mut C, ticks: u32) -> Self {
        Self {
            start: clock.now(),
            ticks,
        }
    }

    #[inline]
    pub fn expired<C: TickSource>(&self, clock: &mut C) -> bool {
        clock.now().wrapping_sub(self.start) >= self.ticks
    }
}

/// Cancellation flag that can be raised from any context, typically a `static`.
#[derive(Debug, Default)]
pub struct CancelToken {
    cancelled: AtomicBool,
}

impl CancelToken {
    pub const fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    #[inline]
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::Release);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Spin until `ready` returns true, the deadline passes, or `cancel` fires.
///
/// `ready` is polled before each deadline check, so a condition that is already met succeeds
/// even with a zero budget.
pub fn wait_until<C, F>(
    clock: &mut C,
    ticks: u32,
    cancel: Option<&CancelToken>,
    what: WaitFor,
    mut ready: F,
) -> Result<(), Error>
where
    C: TickSource,
    F: FnMut() -> bool,
{
    let deadline = Deadline::after(clock, ticks);
    loop {
        if ready() {
            return Ok(());
        }
        if cancel.is_some_and(CancelToken::is_cancelled) {
            return Err(Error::Cancelled);
        }
        if deadline.expired(clock) {
            return Err(Error::Timeout(what));
        }
        core::hint::spin_loop();
    }
}
