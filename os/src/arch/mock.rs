//! Per-thread simulated processor for unit tests.
//!
//! Test threads run in parallel, so all state is thread-local: each test sees
//! its own interrupt flag, timebase and cache-maintenance log.
use core::cell::{Cell, RefCell};
use std::vec::Vec;

use crate::arch::CpuOps;

std::thread_local! {
    static EE: Cell<bool> = const { Cell::new(false) };
    static TIMEBASE: Cell<u64> = const { Cell::new(0) };
    static TB_STEP: Cell<u64> = const { Cell::new(1) };
    static DECREMENTER: Cell<u32> = const { Cell::new(0) };
    static SYNCED: RefCell<Vec<(usize, usize)>> = const { RefCell::new(Vec::new()) };
    static FLUSHED: RefCell<Vec<(usize, usize)>> = const { RefCell::new(Vec::new()) };
}

pub struct MockCpu;

impl MockCpu {
    /// Set how far the timebase advances on every read.
    pub fn set_timebase_step(step: u64) {
        TB_STEP.with(|s| s.set(step));
    }

    pub fn decrementer() -> u32 {
        DECREMENTER.with(|d| d.get())
    }

    /// Ranges passed to [CpuOps::sync_before_exec], in call order.
    pub fn synced_ranges() -> Vec<(usize, usize)> {
        SYNCED.with(|s| s.borrow().clone())
    }

    /// Ranges passed to [CpuOps::flush_dcache], in call order.
    pub fn flushed_ranges() -> Vec<(usize, usize)> {
        FLUSHED.with(|s| s.borrow().clone())
    }
}

impl CpuOps for MockCpu {
    fn interrupts_enabled() -> bool {
        EE.with(|e| e.get())
    }

    fn enable_interrupts() {
        EE.with(|e| e.set(true));
    }

    fn disable_interrupts() {
        EE.with(|e| e.set(false));
    }

    fn timebase() -> u64 {
        let step = TB_STEP.with(|s| s.get());
        TIMEBASE.with(|t| {
            let now = t.get();
            t.set(now + step);
            now
        })
    }

    fn set_decrementer(value: u32) {
        DECREMENTER.with(|d| d.set(value));
    }

    fn flush_dcache(addr: usize, len: usize) {
        FLUSHED.with(|s| s.borrow_mut().push((addr, len)));
    }

    fn invalidate_dcache(_addr: usize, _len: usize) {}

    fn sync_before_exec(addr: usize, len: usize) {
        SYNCED.with(|s| s.borrow_mut().push((addr, len)));
    }

    fn halt() -> ! {
        panic!("cpu halted");
    }
}
