//! ## Arch module
//! This module contains some arch-specific contents.
//!
//! **This module should be kept as minimal as possible**:
//! a function should **only** be implemented here if it is inseparable from the specific architecture.
//!
//! ### Structure
//! Architecture-specific implementations reside in corresponding subdirectories,
//! declared here and used automatically. Every implementation exports a unit struct
//! `Cpu` implementing [CpuOps].
//!
//! Builds for any other architecture (host tools, `cargo build` on a workstation)
//! get the `hosted` implementation, which simulates the machine state with atomics.

/// Declare a private module named `arch_name` if the `target_arch` is `arch_str`, and automatically use all the members within.
///
/// Use this macro to prevent from using hard-coded module names to referencing an arch
macro_rules! define_arch {
    ($arch_name:ident, $arch_str:literal) => {
        #[cfg(target_arch = $arch_str)]
        mod $arch_name;
        #[cfg(target_arch = $arch_str)]
        pub use $arch_name::*;
    };
}

define_arch!(powerpc, "powerpc");

#[cfg(not(target_arch = "powerpc"))]
mod hosted;
#[cfg(not(target_arch = "powerpc"))]
pub use hosted::*;

pub mod cache;
#[cfg(test)]
pub mod mock;

/// Operations on the processor that the runtime needs.
///
/// Implemented by a unit struct per architecture; every stateful runtime type is
/// generic over `C: CpuOps` (defaulting to [Cpu]) so it can be exercised against
/// a simulated processor.
pub trait CpuOps {
    /// Current state of the global external-interrupt enable flag.
    fn interrupts_enabled() -> bool;

    /// Set the global external-interrupt enable flag.
    fn enable_interrupts();

    /// Clear the global external-interrupt enable flag.
    fn disable_interrupts();

    /// Read the free-running monotonic timebase counter.
    fn timebase() -> u64;

    /// Load the decrementer with `value`.
    fn set_decrementer(value: u32);

    /// Write back data cache lines covering `[addr, addr + len)` to memory.
    fn flush_dcache(addr: usize, len: usize);

    /// Discard data cache lines covering `[addr, addr + len)` so that the next
    /// read observes memory written by a DMA engine.
    fn invalidate_dcache(addr: usize, len: usize);

    /// Make freshly written instructions in `[addr, addr + len)` visible to
    /// instruction fetch: write back the data cache lines, then invalidate the
    /// matching instruction cache lines.
    fn sync_before_exec(addr: usize, len: usize);

    /// Stop doing anything, forever.
    fn halt() -> !;
}
