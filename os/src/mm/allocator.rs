//! The pool allocator.
//!
//! Built for large allocate-once allocations: blocks are carved downwards from
//! the top of a pool and only the most recent one of a pool can be given back.
//! Freeing anything else leaks it.
use core::{
    alloc::{GlobalAlloc, Layout},
    ptr::{NonNull, null_mut},
};

use log::{debug, info};

use crate::{
    arch::{Cpu, CpuOps},
    config::{ALLOC_ALIGN, MAX_POOLS, PlatformConfig},
    mm::pool::{Pool, PoolStats},
    platform::Platform,
    sync::IrqCell,
};

/// Which pool an allocation should come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolSelector {
    Mem1,
    Mem2,
    /// Whichever pool currently has more free space.
    Any,
}

struct PoolTable {
    platform: Option<Platform>,
    pools: [Pool; MAX_POOLS],
}

impl PoolTable {
    /// Index of the pool an `Any` request draws from.
    fn pick_any(&self) -> usize {
        if self.platform == Some(Platform::GameCube) || !self.pools[1].is_present() {
            return 0;
        }
        self.pools[0].validate("alloc");
        self.pools[1].validate("alloc");
        // Ties go to MEM2, the larger pool on every console that has one.
        if self.pools[0].free_space() > self.pools[1].free_space() {
            0
        } else {
            1
        }
    }
}

pub struct PoolAllocator<C: CpuOps = Cpu> {
    table: IrqCell<PoolTable, C>,
}

impl<C: CpuOps> PoolAllocator<C> {
    pub const fn new() -> Self {
        PoolAllocator {
            table: IrqCell::new(PoolTable {
                platform: None,
                pools: [Pool::absent(), Pool::absent()],
            }),
        }
    }

    /// Set up the pools described by `config`, forgetting any previous state.
    pub fn init(&self, config: &PlatformConfig) {
        self.table.with(|table| {
            table.platform = Some(config.platform);
            for (pool, region) in table.pools.iter_mut().zip(config.pools.iter()) {
                *pool = match region {
                    Some(region) => Pool::new(*region),
                    None => Pool::absent(),
                };
            }
        });
        for stats in self.stats().iter().flatten() {
            info!(
                "pool {}: {:#x}..{:#x}, {} KiB free",
                stats.name,
                stats.bottom,
                stats.top,
                stats.free() / 1024
            );
        }
    }

    /// Allocate `size` bytes, aligned to [ALLOC_ALIGN].
    ///
    /// `None` when the selected pool is absent or too full.
    pub fn allocate(&self, selector: PoolSelector, size: usize) -> Option<NonNull<u8>> {
        self.table.with(|table| {
            let index = match selector {
                PoolSelector::Mem1 => 0,
                PoolSelector::Mem2 => 1,
                PoolSelector::Any => table.pick_any(),
            };
            table.pools[index].alloc(size)
        })
    }

    /// Give back `ptr` if it is the most recent allocation of some pool.
    ///
    /// Anything else is leaked and `false` is returned.
    pub fn free(&self, ptr: *mut u8) -> bool {
        let Some(ptr) = NonNull::new(ptr) else {
            return false;
        };
        let freed = self.table.with(|table| {
            // Every pool is checked even after a hit so a corrupted one cannot hide.
            table
                .pools
                .iter_mut()
                .fold(false, |freed, pool| pool.try_free(ptr) || freed)
        });
        if !freed {
            debug!("free: {:p} is not the most recent allocation, leaking it", ptr);
        }
        freed
    }

    /// Free bytes left in the selected pool, summed over all pools for `Any`.
    pub fn free_space(&self, selector: PoolSelector) -> usize {
        self.table.with(|table| match selector {
            PoolSelector::Mem1 => table.pools[0].free_space(),
            PoolSelector::Mem2 => table.pools[1].free_space(),
            PoolSelector::Any => table.pools.iter().map(Pool::free_space).sum(),
        })
    }

    /// Bookkeeping of every present pool, by selector index.
    pub fn stats(&self) -> [Option<PoolStats>; MAX_POOLS] {
        self.table.with(|table| {
            let mut stats = [None; MAX_POOLS];
            for (slot, pool) in stats.iter_mut().zip(table.pools.iter()) {
                *slot = pool.is_present().then(|| pool.stats());
            }
            stats
        })
    }
}

impl<C: CpuOps> Default for PoolAllocator<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// [GlobalAlloc] front for the global pools.
pub struct GlobalPools;

unsafe impl GlobalAlloc for GlobalPools {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if layout.align() > ALLOC_ALIGN {
            return null_mut();
        }
        super::POOLS
            .allocate(PoolSelector::Any, layout.size())
            .map_or(null_mut(), NonNull::as_ptr)
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        super::POOLS.free(ptr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        arch::mock::MockCpu,
        config::PoolRegion,
        mm::pool::{BLOCK_HEADER_SIZE, rounded_size},
    };
    use std::{vec, vec::Vec};

    /// Heap memory standing in for a pool region.
    struct Arena {
        _buf: Vec<u8>,
        bottom: usize,
        top: usize,
    }

    impl Arena {
        fn new(size: usize) -> Arena {
            let buf = vec![0u8; size + ALLOC_ALIGN];
            let bottom = (buf.as_ptr() as usize).next_multiple_of(ALLOC_ALIGN);
            Arena {
                _buf: buf,
                bottom,
                top: bottom + size,
            }
        }

        fn region(&self, name: &'static str) -> PoolRegion {
            PoolRegion {
                name,
                top: self.top,
                bottom: self.bottom,
            }
        }
    }

    fn gamecube(mem1: &Arena) -> PoolAllocator<MockCpu> {
        let alloc = PoolAllocator::new();
        alloc.init(&PlatformConfig::new(
            Platform::GameCube,
            [Some(mem1.region("MEM1")), None],
        ));
        alloc
    }

    fn wii(mem1: &Arena, mem2: &Arena) -> PoolAllocator<MockCpu> {
        let alloc = PoolAllocator::new();
        alloc.init(&PlatformConfig::new(
            Platform::Wii,
            [Some(mem1.region("MEM1")), Some(mem2.region("MEM2"))],
        ));
        alloc
    }

    fn ptr(p: Option<NonNull<u8>>) -> *mut u8 {
        p.unwrap().as_ptr()
    }

    #[test]
    fn test_scenario_stacked_frees() {
        let mem1 = Arena::new(1 << 20);
        let alloc = gamecube(&mem1);
        let initial = alloc.free_space(PoolSelector::Mem1);

        let a = ptr(alloc.allocate(PoolSelector::Mem1, 4096));
        let after_a = alloc.free_space(PoolSelector::Mem1);
        assert_eq!(initial - after_a, BLOCK_HEADER_SIZE + rounded_size(4096).unwrap());

        let b = ptr(alloc.allocate(PoolSelector::Mem1, 8192));
        assert!(alloc.free_space(PoolSelector::Mem1) < after_a);

        assert!(alloc.free(b));
        assert_eq!(alloc.free_space(PoolSelector::Mem1), after_a);
        assert!(alloc.free(a));
        assert_eq!(alloc.free_space(PoolSelector::Mem1), initial);
    }

    #[test]
    fn test_lifo_law() {
        let mem1 = Arena::new(64 * 1024);
        let alloc = gamecube(&mem1);
        let sizes = [1usize, 31, 32, 100, 777, 4096];
        let ptrs: Vec<*mut u8> = sizes
            .iter()
            .map(|&s| ptr(alloc.allocate(PoolSelector::Mem1, s)))
            .collect();

        for n in (0..ptrs.len()).rev() {
            for &older in &ptrs[..n] {
                let before = alloc.stats();
                assert!(!alloc.free(older));
                assert_eq!(alloc.stats(), before);
            }
            assert!(alloc.free(ptrs[n]));
        }
        let stats = alloc.stats()[0].unwrap();
        assert_eq!(stats.cur_bottom, stats.top);
    }

    #[test]
    fn test_alignment() {
        let mem1 = Arena::new(64 * 1024);
        let mem2 = Arena::new(64 * 1024);
        let alloc = wii(&mem1, &mem2);
        for size in [0usize, 1, 7, 8, 9, 24, 25, 33, 63, 64, 65, 1000] {
            for selector in [PoolSelector::Mem1, PoolSelector::Mem2, PoolSelector::Any] {
                let p = ptr(alloc.allocate(selector, size)) as usize;
                assert_eq!(p % ALLOC_ALIGN, 0, "size {size} from {selector:?}");
            }
        }
    }

    #[test]
    fn test_unaligned_region_still_aligns() {
        let arena = Arena::new(4096);
        let alloc = PoolAllocator::<MockCpu>::new();
        alloc.init(&PlatformConfig::new(
            Platform::GameCube,
            [
                Some(PoolRegion {
                    name: "MEM1",
                    top: arena.top - 3,
                    bottom: arena.bottom + 5,
                }),
                None,
            ],
        ));
        let p = ptr(alloc.allocate(PoolSelector::Mem1, 10)) as usize;
        assert_eq!(p % ALLOC_ALIGN, 0);
        assert!(p + 10 <= arena.top - 3);
    }

    #[test]
    fn test_exhaustion_leaves_pool_unchanged() {
        let mem1 = Arena::new(1024);
        let alloc = gamecube(&mem1);
        let free = alloc.free_space(PoolSelector::Mem1);
        assert!(alloc.allocate(PoolSelector::Mem1, free).is_none());
        assert_eq!(alloc.free_space(PoolSelector::Mem1), free);

        // the largest block that fits leaves less than one aligned unit behind
        let fits = free / ALLOC_ALIGN * ALLOC_ALIGN - BLOCK_HEADER_SIZE;
        assert_eq!(rounded_size(fits), Some(fits));
        assert!(alloc.allocate(PoolSelector::Mem1, fits).is_some());
        assert!(alloc.free_space(PoolSelector::Mem1) < ALLOC_ALIGN);
        assert!(alloc.allocate(PoolSelector::Mem1, 0).is_none());
    }

    #[test]
    fn test_absent_pool_returns_none() {
        let mem1 = Arena::new(4096);
        let alloc = gamecube(&mem1);
        assert!(alloc.allocate(PoolSelector::Mem2, 16).is_none());
        assert!(alloc.stats()[1].is_none());
        // the single pool takes every Any request
        let p = ptr(alloc.allocate(PoolSelector::Any, 16)) as usize;
        assert!(p >= mem1.bottom && p < mem1.top);
    }

    #[test]
    fn test_uninitialized_allocator_is_empty() {
        let alloc = PoolAllocator::<MockCpu>::new();
        assert!(alloc.allocate(PoolSelector::Any, 16).is_none());
        assert!(alloc.stats().iter().all(Option::is_none));
    }

    #[test]
    fn test_any_prefers_more_free_space() {
        let mem1 = Arena::new(8 * 1024);
        let mem2 = Arena::new(32 * 1024);
        let alloc = wii(&mem1, &mem2);

        let p = ptr(alloc.allocate(PoolSelector::Any, 64)) as usize;
        assert!(p >= mem2.bottom && p < mem2.top);

        // drain MEM2 below MEM1
        let big = alloc.free_space(PoolSelector::Mem2) - 4 * 1024;
        alloc.allocate(PoolSelector::Mem2, big - BLOCK_HEADER_SIZE).unwrap();
        assert!(alloc.free_space(PoolSelector::Mem1) > alloc.free_space(PoolSelector::Mem2));

        let p = ptr(alloc.allocate(PoolSelector::Any, 64)) as usize;
        assert!(p >= mem1.bottom && p < mem1.top);
    }

    #[test]
    fn test_free_finds_owning_pool() {
        let mem1 = Arena::new(4096);
        let mem2 = Arena::new(4096);
        let alloc = wii(&mem1, &mem2);
        let a = ptr(alloc.allocate(PoolSelector::Mem1, 100));
        let b = ptr(alloc.allocate(PoolSelector::Mem2, 100));
        // each is the newest block of its own pool
        assert!(alloc.free(a));
        assert!(alloc.free(b));
        assert_eq!(alloc.stats()[0].unwrap().used(), 0);
        assert_eq!(alloc.stats()[1].unwrap().used(), 0);
    }

    #[test]
    fn test_free_null_and_foreign() {
        let mem1 = Arena::new(4096);
        let alloc = gamecube(&mem1);
        assert!(!alloc.free(null_mut()));
        let mut local = [0u8; 64];
        assert!(!alloc.free(local.as_mut_ptr()));
    }

    #[test]
    #[should_panic(expected = "corrupted block metadata")]
    fn test_corrupted_block_magic_is_fatal() {
        let mem1 = Arena::new(4096);
        let alloc = gamecube(&mem1);
        let p = ptr(alloc.allocate(PoolSelector::Mem1, 64));
        unsafe { p.sub(BLOCK_HEADER_SIZE).write(0) };
        alloc.free(p);
    }

    #[test]
    #[should_panic(expected = "corrupted MEM1 pool metadata")]
    fn test_corrupted_pool_magic_is_fatal() {
        let mem1 = Arena::new(4096);
        let alloc = gamecube(&mem1);
        alloc.table.with(|table| table.pools[0].corrupt());
        alloc.allocate(PoolSelector::Mem1, 16);
    }
}
