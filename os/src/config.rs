//! Configurations for the runtime.
//!
//! Constants describe things fixed by the hardware or by table sizes;
//! [PlatformConfig] is what bring-up discovers at run time and passes down
//! explicitly.
use spin::Once;

use crate::platform::Platform;

/// MEM1 and MEM2.
pub const MAX_POOLS: usize = 2;

/// Alignment of every pointer handed out by the pool allocator.
pub const ALLOC_ALIGN: usize = 32;

pub const MAX_CALLBACKS: usize = 64;

pub const MAX_OUTPUT_DEVICES: usize = 16;

pub const BACKTRACE_MAX_DEPTH: usize = 32;

pub const MEMLOG_SIZE: usize = 0x1_0000;

/// Cached, translated view of physical address 0.
pub const CACHED_BASE: usize = 0x8000_0000;

/// First exception vector offset.
pub const VECTOR_FIRST: usize = 0x100;
/// One past the last exception vector offset.
pub const VECTOR_END: usize = 0x2000;
/// Distance between consecutive vector stubs.
pub const VECTOR_STRIDE: usize = 0x10;
/// Where the stubs store r0-r31 and the shared body the special registers.
pub const VECTOR_SAVE_AREA: usize = 0x2000;
/// Where the shared exception body is copied to.
pub const VECTOR_BODY: usize = 0x2200;
/// Low memory owned by the exception subsystem.
pub const LOW_MEMORY_SIZE: usize = 0x3000;

/// Decrementer reload value that keeps it quiet for as long as possible.
pub const DECREMENTER_MAX: u32 = 0x7fff_ffff;

/// MEM1 as seen by every console in its native mode.
pub const MEM1_SIZE: usize = 0x0180_0000;
/// Lowest MEM1 address handed out; everything below belongs to the vectors.
pub const MEM1_POOL_BOTTOM: usize = 0x8000_4000;
pub const MEM2_CACHED_BASE: usize = 0x9000_0000;
pub const MEM2_SIZE: usize = 0x0400_0000;

/// A memory region to be managed as an allocation pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolRegion {
    pub name: &'static str,
    /// Highest address, allocations start here.
    pub top: usize,
    /// Lowest usable address.
    pub bottom: usize,
}

/// Everything platform bring-up knows that the runtime needs.
#[derive(Debug, Clone, Copy)]
pub struct PlatformConfig {
    pub platform: Platform,
    /// Pool regions by [crate::mm::PoolSelector] index; `None` when absent.
    pub pools: [Option<PoolRegion>; MAX_POOLS],
}

impl PlatformConfig {
    pub const fn new(platform: Platform, pools: [Option<PoolRegion>; MAX_POOLS]) -> Self {
        PlatformConfig { platform, pools }
    }

    /// The standard memory layout of `platform`.
    ///
    /// MEM1 spans from the vectors up to `mem1_top` (where the runtime image
    /// was placed). Consoles with MEM2 give all of it to the second pool.
    pub fn standard(platform: Platform, mem1_top: usize) -> Self {
        let mem1 = PoolRegion {
            name: "MEM1",
            top: mem1_top,
            bottom: MEM1_POOL_BOTTOM,
        };
        let mem2 = platform.has_mem2().then_some(PoolRegion {
            name: "MEM2",
            top: MEM2_CACHED_BASE + MEM2_SIZE,
            bottom: MEM2_CACHED_BASE,
        });
        PlatformConfig::new(platform, [Some(mem1), mem2])
    }

    /// Whether `[addr, addr + len)` lies entirely in cached MEM1, or cached
    /// MEM2 on consoles that have it. Anything else may not be mapped.
    pub fn is_cached_ram(&self, addr: usize, len: usize) -> bool {
        let Some(end) = addr.checked_add(len) else {
            return false;
        };
        let within = |base: usize, size: usize| addr >= base && end <= base + size;
        within(CACHED_BASE, MEM1_SIZE)
            || (self.platform.has_mem2() && within(MEM2_CACHED_BASE, MEM2_SIZE))
    }
}

static CONFIG: Once<PlatformConfig> = Once::new();

/// Publish the boot configuration. It can only be done once.
pub fn publish(config: PlatformConfig) -> &'static PlatformConfig {
    publish_into(&CONFIG, config)
}

fn publish_into(cell: &Once<PlatformConfig>, config: PlatformConfig) -> &PlatformConfig {
    if cell.is_completed() {
        panic_fatal!("config", "The platform configuration cannot be published twice.");
    }
    cell.call_once(|| config)
}

/// The published configuration, `None` before bring-up has run.
pub fn get() -> Option<&'static PlatformConfig> {
    CONFIG.get()
}
