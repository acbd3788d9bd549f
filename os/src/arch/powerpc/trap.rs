//! Exception entry glue.
//!
//! Every vector stub saves r0-r31 to the save area at physical `0x2000` and
//! branches to the shared body copied to `0x2200`. The body stores the special
//! registers after the GPRs, turns translation back on and `rfi`s into
//! [exception_entry] with the vector number in r3, still on the interrupted
//! stack. Recoverable exceptions leave through [irq_return], which reloads the
//! whole save area and `rfi`s to the interrupted code.
use core::arch::global_asm;

use crate::{
    config::{self, CACHED_BASE, VECTOR_SAVE_AREA},
    trap::{
        self,
        handler::{SavedRegs, StackReader, frame_readable},
    },
};

global_asm!(
    r#"
    .section .text.exception_body, "ax"
    .globl exception_body_start
    .globl exception_body_end
exception_body_start:
    mfcr    0
    stw     0, 0x2080(0)
    mfxer   0
    stw     0, 0x2084(0)
    mflr    0
    stw     0, 0x2088(0)
    mfctr   0
    stw     0, 0x208c(0)
    mfsrr0  0
    stw     0, 0x2090(0)
    mfsrr1  0
    stw     0, 0x2094(0)
    mfdar   0
    stw     0, 0x2098(0)
    mfdsisr 0
    stw     0, 0x209c(0)

    # FP | IR | DR, EE stays clear
    mfmsr   0
    ori     0, 0, 0x2030
    mtsrr1  0

    lis     0, {entry}@h
    ori     0, 0, {entry}@l
    mtsrr0  0
    rfi
exception_body_end:

    .section .text.irq_return, "ax"
    .globl irq_return
irq_return:
    lis     3, 0x8000
    lwz     0, 0x2080(3)
    mtcr    0
    lwz     0, 0x2084(3)
    mtxer   0
    lwz     0, 0x2088(3)
    mtlr    0
    lwz     0, 0x208c(3)
    mtctr   0
    lwz     0, 0x2090(3)
    mtsrr0  0
    lwz     0, 0x2094(3)
    mtsrr1  0
    lwz     0, 0x2000(3)
    lwz     1, 0x2004(3)
    lwz     2, 0x2008(3)
    lmw     4, 0x2010(3)
    lwz     3, 0x200c(3)
    rfi
    "#,
    entry = sym exception_entry,
);

unsafe extern "C" {
    static exception_body_start: u8;
    static exception_body_end: u8;
    fn irq_return() -> !;
}

/// Machine code of the shared exception body, to be copied to `0x2200`.
pub fn exception_body() -> &'static [u8] {
    unsafe {
        let start = &raw const exception_body_start;
        let end = &raw const exception_body_end;
        core::slice::from_raw_parts(start, end as usize - start as usize)
    }
}

/// Reads stack frames straight out of memory, refusing anything outside
/// cached RAM.
pub struct RawStack;

impl StackReader for RawStack {
    fn read_frame(&self, sp: u32) -> Option<(u32, u32)> {
        if !frame_readable(config::get(), sp) {
            return None;
        }
        let frame = sp as *const u32;
        unsafe { Some((frame.read_volatile(), frame.add(1).read_volatile())) }
    }
}

#[unsafe(no_mangle)]
extern "C" fn exception_entry(vector: u32) -> ! {
    // Filled in by the stub and the shared body before we got here.
    let regs = unsafe { &*((CACHED_BASE + VECTOR_SAVE_AREA) as *const SavedRegs) };
    trap::handle_exception(vector, regs, &RawStack);
    unsafe { irq_return() }
}
