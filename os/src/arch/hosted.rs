//! Simulated processor for builds that do not target the console.
//!
//! There is no machine to own: the interrupt flag and decrementer are plain
//! atomics and the timebase advances by one tick on every read, so bounded
//! waits always terminate.
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use crate::arch::CpuOps;

static EE: AtomicBool = AtomicBool::new(false);
static TIMEBASE: AtomicU64 = AtomicU64::new(0);
static DECREMENTER: AtomicU32 = AtomicU32::new(0);

pub struct Cpu;

impl CpuOps for Cpu {
    fn interrupts_enabled() -> bool {
        EE.load(Ordering::Acquire)
    }

    fn enable_interrupts() {
        EE.store(true, Ordering::Release);
    }

    fn disable_interrupts() {
        EE.store(false, Ordering::Release);
    }

    fn timebase() -> u64 {
        TIMEBASE.fetch_add(1, Ordering::Relaxed)
    }

    fn set_decrementer(value: u32) {
        DECREMENTER.store(value, Ordering::Relaxed);
    }

    fn flush_dcache(_addr: usize, _len: usize) {}

    fn invalidate_dcache(_addr: usize, _len: usize) {}

    fn sync_before_exec(_addr: usize, _len: usize) {}

    fn halt() -> ! {
        loop {
            core::hint::spin_loop();
        }
    }
}

/// There is no exception body to install off the console.
pub fn exception_body() -> &'static [u8] {
    &[]
}
