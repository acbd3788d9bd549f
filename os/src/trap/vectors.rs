//! Exception vector installation.
//!
//! Every vector slot from `0x100` to `0x2000` gets the same four-word stub:
//!
//! ```text
//! stmw 0, 0x2000(0)    save r0-r31 to the save area
//! li   3, <vector>     vector number as the first argument
//! ba   0x2200          shared exception body
//! ```
//!
//! The body is position independent machine code supplied by `arch`.
use core::ptr::NonNull;

use log::info;
use utils::num::AlignableTo;

use crate::{
    arch::{Cpu, CpuOps},
    config::{LOW_MEMORY_SIZE, VECTOR_BODY, VECTOR_END, VECTOR_FIRST, VECTOR_SAVE_AREA, VECTOR_STRIDE},
    sync::IrqCell,
};

const STMW_R0_SAVE_AREA: u32 = 0xbc00_0000 | VECTOR_SAVE_AREA as u32;
const LI_R3: u32 = 0x3860_0000;
const LI_R3_MASK: u32 = 0xffff_0000;
const BA: u32 = 0x4800_0002;
const BA_MASK: u32 = 0xfc00_0003;
const BA_TARGET_MASK: u32 = 0x03ff_fffc;

pub const STUB_WORDS: usize = 4;

/// Machine code of the stub for `vector`.
pub const fn stub(vector: u32) -> [u32; STUB_WORDS] {
    [
        STMW_R0_SAVE_AREA,
        LI_R3 | vector,
        BA | VECTOR_BODY as u32,
        0,
    ]
}

/// What a vector stub does, read back from memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedStub {
    /// Vector number handed to the shared body.
    pub vector: u32,
    /// Absolute branch target.
    pub target: u32,
}

/// The reserved region at the bottom of physical memory.
pub struct LowMemory {
    base: NonNull<u32>,
    len: usize,
}

impl LowMemory {
    /// # Safety
    /// `[base, base + len)` must be writable, executable memory owned by the
    /// exception subsystem, aligned to four bytes.
    pub const unsafe fn new(base: NonNull<u8>, len: usize) -> Self {
        LowMemory {
            base: base.cast(),
            len,
        }
    }

    pub fn base(&self) -> usize {
        self.base.as_ptr() as usize
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn check(&self, offset: usize, len: usize) {
        if offset.checked_add(len).is_none_or(|end| end > self.len) {
            panic_fatal!(
                "exceptions",
                "{:#x}+{:#x} is outside low memory ({:#x} bytes)",
                offset,
                len,
                self.len
            );
        }
    }

    fn check_word(&self, offset: usize, len: usize) {
        if !offset.is_aligned_to(4) {
            panic_fatal!("exceptions", "unaligned low memory word at {:#x}", offset);
        }
        self.check(offset, len);
    }

    pub fn write_words(&self, offset: usize, words: &[u32]) {
        self.check_word(offset, words.len() * 4);
        for (i, word) in words.iter().enumerate() {
            // In bounds and word aligned, see check().
            unsafe { self.base.add(offset / 4 + i).write_volatile(*word) };
        }
    }

    pub fn read_word(&self, offset: usize) -> u32 {
        self.check_word(offset, 4);
        unsafe { self.base.add(offset / 4).read_volatile() }
    }

    pub fn write_bytes(&self, offset: usize, bytes: &[u8]) {
        self.check(offset, bytes.len());
        unsafe {
            core::ptr::copy_nonoverlapping(
                bytes.as_ptr(),
                self.base.cast::<u8>().add(offset).as_ptr(),
                bytes.len(),
            )
        };
    }
}

/// Lifecycle of the exception vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorState {
    Uninitialized,
    /// Installed with external interrupts in whatever state they were.
    Installed,
    Enabled,
    Disabled,
}

pub struct Vectors<C: CpuOps = Cpu> {
    state: IrqCell<VectorState, C>,
}

impl<C: CpuOps> Vectors<C> {
    pub const fn new() -> Self {
        Vectors {
            state: IrqCell::new(VectorState::Uninitialized),
        }
    }

    pub fn state(&self) -> VectorState {
        self.state.get()
    }

    /// Write a stub to every vector and copy `body` behind them. Only once.
    pub fn install(&self, mem: &LowMemory, body: &[u8]) {
        if self.state() != VectorState::Uninitialized {
            panic_fatal!("exceptions", "vectors installed twice");
        }
        if mem.len() < LOW_MEMORY_SIZE || body.len() > LOW_MEMORY_SIZE - VECTOR_BODY {
            panic_fatal!(
                "exceptions",
                "exception body of {:#x} bytes does not fit",
                body.len()
            );
        }

        for vector in (VECTOR_FIRST..VECTOR_END).step_by(VECTOR_STRIDE) {
            mem.write_words(vector, &stub(vector as u32));
        }
        C::sync_before_exec(mem.base() + VECTOR_FIRST, VECTOR_END - VECTOR_FIRST);

        mem.write_bytes(VECTOR_BODY, body);
        C::sync_before_exec(mem.base() + VECTOR_BODY, body.len());

        self.state.set(VectorState::Installed);
        info!("exception vectors installed, body is {} bytes", body.len());
    }

    pub fn enable(&self) {
        self.transition(VectorState::Enabled);
        C::enable_interrupts();
    }

    pub fn disable(&self) {
        self.transition(VectorState::Disabled);
        C::disable_interrupts();
    }

    fn transition(&self, to: VectorState) {
        if self.state() == VectorState::Uninitialized {
            panic_fatal!("exceptions", "interrupts switched before vectors were installed");
        }
        self.state.set(to);
    }

    /// Read back and decode the stub at `vector`.
    ///
    /// `None` if the words there are not a vector stub.
    pub fn decode_stub(mem: &LowMemory, vector: usize) -> Option<DecodedStub> {
        let words: [u32; STUB_WORDS] = core::array::from_fn(|i| mem.read_word(vector + i * 4));
        let valid = words[0] == STMW_R0_SAVE_AREA
            && words[1] & LI_R3_MASK == LI_R3
            && words[2] & BA_MASK == BA;
        valid.then_some(DecodedStub {
            vector: words[1] & !LI_R3_MASK,
            target: words[2] & BA_TARGET_MASK,
        })
    }
}

impl<C: CpuOps> Default for Vectors<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::arch::mock::MockCpu;
    use std::{vec, vec::Vec};

    /// Heap memory standing in for low memory.
    pub struct FakeLowMemory {
        buf: Vec<u32>,
    }

    impl FakeLowMemory {
        pub fn new() -> Self {
            FakeLowMemory {
                buf: vec![0; LOW_MEMORY_SIZE / 4],
            }
        }

        pub fn view(&mut self) -> LowMemory {
            let base = NonNull::new(self.buf.as_mut_ptr().cast::<u8>()).unwrap();
            unsafe { LowMemory::new(base, LOW_MEMORY_SIZE) }
        }
    }

    pub const BODY: [u8; 12] = [0x7c, 0x00, 0x00, 0x26, 0x90, 0x00, 0x20, 0x80, 0x4c, 0x00, 0x00, 0x64];

    #[test]
    fn test_stub_encoding() {
        assert_eq!(stub(0x500), [0xbc00_2000, 0x3860_0500, 0x4800_2202, 0]);
    }

    #[test]
    fn test_install_writes_every_vector() {
        let mut fake = FakeLowMemory::new();
        let mem = fake.view();
        let vectors = Vectors::<MockCpu>::new();
        vectors.install(&mem, &BODY);
        assert_eq!(vectors.state(), VectorState::Installed);

        for vector in (VECTOR_FIRST..VECTOR_END).step_by(VECTOR_STRIDE) {
            let stub = Vectors::<MockCpu>::decode_stub(&mem, vector).unwrap();
            assert_eq!(stub.vector as usize, vector);
            assert_eq!(stub.target as usize, VECTOR_BODY);
        }
        assert_eq!(Vectors::<MockCpu>::decode_stub(&mem, 0), None);

        let body: Vec<u8> = (0..BODY.len() / 4)
            .flat_map(|i| mem.read_word(VECTOR_BODY + i * 4).to_ne_bytes())
            .collect();
        assert_eq!(body, BODY);
    }

    #[test]
    fn test_install_syncs_caches() {
        let mut fake = FakeLowMemory::new();
        let mem = fake.view();
        Vectors::<MockCpu>::new().install(&mem, &BODY);
        assert_eq!(
            MockCpu::synced_ranges(),
            vec![
                (mem.base() + 0x100, 0x1f00),
                (mem.base() + 0x2200, BODY.len())
            ]
        );
    }

    #[test]
    fn test_enable_disable() {
        let mut fake = FakeLowMemory::new();
        let mem = fake.view();
        let vectors = Vectors::<MockCpu>::new();
        vectors.install(&mem, &BODY);
        vectors.enable();
        assert!(MockCpu::interrupts_enabled());
        assert_eq!(vectors.state(), VectorState::Enabled);
        vectors.disable();
        assert!(!MockCpu::interrupts_enabled());
        vectors.enable();
        assert_eq!(vectors.state(), VectorState::Enabled);
    }

    #[test]
    #[should_panic(expected = "installed twice")]
    fn test_install_twice_is_fatal() {
        let mut fake = FakeLowMemory::new();
        let mem = fake.view();
        let vectors = Vectors::<MockCpu>::new();
        vectors.install(&mem, &BODY);
        vectors.install(&mem, &BODY);
    }

    #[test]
    #[should_panic(expected = "outside low memory")]
    fn test_out_of_bounds_write_is_fatal() {
        let mut fake = FakeLowMemory::new();
        fake.view().write_words(LOW_MEMORY_SIZE - 4, &[0, 0]);
    }

    #[test]
    #[should_panic(expected = "unaligned low memory word")]
    fn test_unaligned_read_is_fatal() {
        let mut fake = FakeLowMemory::new();
        fake.view().read_word(0x102);
    }

    #[test]
    #[should_panic(expected = "before vectors were installed")]
    fn test_enable_before_install_is_fatal() {
        Vectors::<MockCpu>::new().enable();
    }
}
