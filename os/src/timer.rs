//! Delays and bounded waits on the timebase.
//!
//! Nothing here yields: waiting means spinning on the timebase until the
//! condition holds or the budget runs out.
use core::marker::PhantomData;

use crate::{
    arch::{Cpu, CpuOps},
    config,
    error::TimeoutError,
    platform::Platform,
};

pub struct Timebase<C: CpuOps = Cpu> {
    ticks_per_usec: u64,
    _cpu: PhantomData<fn() -> C>,
}

impl<C: CpuOps> Clone for Timebase<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C: CpuOps> Copy for Timebase<C> {}

impl<C: CpuOps> Timebase<C> {
    pub const fn new(platform: Platform) -> Self {
        Timebase {
            ticks_per_usec: platform.ticks_per_usec(),
            _cpu: PhantomData,
        }
    }

    pub fn now(&self) -> u64 {
        C::timebase()
    }

    pub const fn usec_to_ticks(&self, usec: u64) -> u64 {
        self.ticks_per_usec.saturating_mul(usec)
    }

    /// Whether `usec` microseconds have passed since timebase value `start`.
    pub fn has_elapsed(&self, start: u64, usec: u64) -> bool {
        C::timebase().wrapping_sub(start) >= self.usec_to_ticks(usec)
    }

    /// Spin for at least `usec` microseconds.
    pub fn udelay(&self, usec: u64) {
        let start = C::timebase();
        while !self.has_elapsed(start, usec) {
            core::hint::spin_loop();
        }
    }

    /// Spin until `cond` holds, giving up after `timeout_us` microseconds.
    ///
    /// `cond` is checked at least once, even with a zero budget.
    pub fn spin_until(
        &self,
        timeout_us: u64,
        mut cond: impl FnMut() -> bool,
    ) -> Result<(), TimeoutError> {
        let start = C::timebase();
        loop {
            if cond() {
                return Ok(());
            }
            if self.has_elapsed(start, timeout_us) {
                return Err(TimeoutError { timeout_us });
            }
            core::hint::spin_loop();
        }
    }
}

/// Timebase of the running console.
///
/// Before bring-up publishes the configuration the fastest timebase is
/// assumed, so delays can only come out long.
pub fn timebase() -> Timebase {
    let platform = config::get().map_or(Platform::WiiU, |cfg| cfg.platform);
    Timebase::new(platform)
}

pub fn udelay(usec: u64) {
    timebase().udelay(usec);
}

pub fn spin_until(timeout_us: u64, cond: impl FnMut() -> bool) -> Result<(), TimeoutError> {
    timebase().spin_until(timeout_us, cond)
}
