//! Arch-specified functions for the 32-bit PowerPC (Gekko / Broadway / Espresso)

use core::arch::asm;

use bitflags::bitflags;

use crate::arch::{CpuOps, cache::cache_lines};

pub mod trap;
pub use trap::exception_body;

bitflags! {
    /// Machine State Register bits the runtime touches.
    pub struct Msr: u32 {
        /// External interrupt enable.
        const EE = 1 << 15;
        /// Floating point available.
        const FP = 1 << 13;
        /// Instruction address translation.
        const IR = 1 << 5;
        /// Data address translation.
        const DR = 1 << 4;
    }
}

#[inline(always)]
fn read_msr() -> Msr {
    let msr: u32;
    unsafe {
        asm!("mfmsr {0}", out(reg) msr, options(nomem, nostack, preserves_flags));
    }
    // keep the bits we have no names for, they are written back unchanged
    unsafe { Msr::from_bits_unchecked(msr) }
}

#[inline(always)]
fn write_msr(msr: Msr) {
    unsafe {
        asm!("mtmsr {0}", "isync", in(reg) msr.bits(), options(nostack, preserves_flags));
    }
}

pub struct Cpu;

impl CpuOps for Cpu {
    #[inline(always)]
    fn interrupts_enabled() -> bool {
        read_msr().contains(Msr::EE)
    }

    #[inline(always)]
    fn enable_interrupts() {
        write_msr(read_msr() | Msr::EE);
    }

    #[inline(always)]
    fn disable_interrupts() {
        write_msr(read_msr() - Msr::EE);
    }

    fn timebase() -> u64 {
        let (mut hi, mut lo, mut hi2): (u32, u32, u32);
        loop {
            unsafe {
                asm!(
                    "mftbu {hi}",
                    "mftb {lo}",
                    "mftbu {hi2}",
                    hi = out(reg) hi,
                    lo = out(reg) lo,
                    hi2 = out(reg) hi2,
                    options(nomem, nostack, preserves_flags)
                );
            }
            // upper half rolled over between the reads
            if hi == hi2 {
                break;
            }
        }
        ((hi as u64) << 32) | lo as u64
    }

    fn set_decrementer(value: u32) {
        unsafe {
            asm!("mtdec {0}", in(reg) value, options(nomem, nostack, preserves_flags));
        }
    }

    fn flush_dcache(addr: usize, len: usize) {
        for line in cache_lines(addr, len) {
            unsafe {
                asm!("dcbst 0, {0}", in(reg_nonzero) line, options(nostack, preserves_flags));
            }
        }
        unsafe {
            asm!("sync", "isync", options(nostack, preserves_flags));
        }
    }

    fn invalidate_dcache(addr: usize, len: usize) {
        for line in cache_lines(addr, len) {
            unsafe {
                asm!("dcbi 0, {0}", in(reg_nonzero) line, options(nostack, preserves_flags));
            }
        }
        unsafe {
            asm!("sync", options(nostack, preserves_flags));
        }
    }

    fn sync_before_exec(addr: usize, len: usize) {
        for line in cache_lines(addr, len) {
            unsafe {
                asm!(
                    "dcbst 0, {0}",
                    "sync",
                    "icbi 0, {0}",
                    in(reg_nonzero) line,
                    options(nostack, preserves_flags)
                );
            }
        }
        unsafe {
            asm!("sync", "isync", options(nostack, preserves_flags));
        }
    }

    fn halt() -> ! {
        loop {
            core::hint::spin_loop();
        }
    }
}
