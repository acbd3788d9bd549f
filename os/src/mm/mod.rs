//! Memory management: one or two pools carved downwards.
mod allocator;
mod pool;

pub use allocator::*;
pub use pool::{BLOCK_HEADER_SIZE, PoolStats, rounded_size};

use core::ptr::NonNull;

use crate::config::PlatformConfig;

/// The pools every driver allocates from.
pub static POOLS: PoolAllocator = PoolAllocator::new();

/// Initializes the memory pools of the running console.
pub fn init(config: &PlatformConfig) {
    POOLS.init(config);
}

pub fn alloc(selector: PoolSelector, size: usize) -> Option<NonNull<u8>> {
    POOLS.allocate(selector, size)
}

pub fn free(ptr: *mut u8) -> bool {
    POOLS.free(ptr)
}
