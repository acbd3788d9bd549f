//! One contiguous region handed out downwards from its top.
use core::{mem::size_of, ptr::NonNull};

use utils::num::{align_down_pow2, align_up_pow2};

use crate::config::{ALLOC_ALIGN, PoolRegion};

const POOL_MAGIC: [u8; 8] = *b"\x7fMEMPOOL";
const BLOCK_MAGIC: [u8; 4] = *b"\x7fMBL";

/// Header written directly below every live allocation.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
struct BlockHeader {
    magic: [u8; 4],
    /// Rounded size of the data following the header.
    size: u32,
}

pub const BLOCK_HEADER_SIZE: usize = size_of::<BlockHeader>();

/// Size actually carved for a request of `size` bytes, header excluded.
///
/// Header plus rounded size is a multiple of [ALLOC_ALIGN], so data pointers
/// stay aligned as long as the first one is.
pub const fn rounded_size(size: usize) -> Option<usize> {
    match size.checked_add(BLOCK_HEADER_SIZE + ALLOC_ALIGN - 1) {
        Some(_) => Some(align_up_pow2(size + BLOCK_HEADER_SIZE, ALLOC_ALIGN) - BLOCK_HEADER_SIZE),
        None => None,
    }
}

/// Bookkeeping of one pool.
///
/// `bottom <= cur_bottom <= top` always holds. A pool whose three addresses
/// are all zero is not present on this machine.
#[derive(Debug)]
pub struct Pool {
    magic: [u8; 8],
    top: usize,
    bottom: usize,
    cur_bottom: usize,
    name: &'static str,
}

/// Snapshot of a pool's bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub name: &'static str,
    pub top: usize,
    pub bottom: usize,
    pub cur_bottom: usize,
}

impl PoolStats {
    pub fn free(&self) -> usize {
        self.cur_bottom - self.bottom
    }

    pub fn used(&self) -> usize {
        self.top - self.cur_bottom
    }
}

impl Pool {
    pub const fn absent() -> Pool {
        Pool {
            magic: POOL_MAGIC,
            top: 0,
            bottom: 0,
            cur_bottom: 0,
            name: "none",
        }
    }

    /// Manage `region`.
    ///
    /// The top is lowered until the first data pointer (top minus one header)
    /// lands on an [ALLOC_ALIGN] boundary.
    pub fn new(region: PoolRegion) -> Pool {
        let top = align_down_pow2(region.top + BLOCK_HEADER_SIZE, ALLOC_ALIGN) - BLOCK_HEADER_SIZE;
        if region.bottom == 0 || top < region.bottom {
            panic_fatal!(
                "allocator",
                "pool {} has no room: {:#x}..{:#x}",
                region.name,
                region.bottom,
                region.top
            );
        }
        Pool {
            magic: POOL_MAGIC,
            top,
            bottom: region.bottom,
            cur_bottom: top,
            name: region.name,
        }
    }

    /// Panic unless the metadata is intact. `op` names the caller.
    pub fn validate(&self, op: &str) {
        if self.magic != POOL_MAGIC {
            panic_fatal!("allocator", "{}: corrupted {} pool metadata", op, self.name);
        }
    }

    pub fn is_present(&self) -> bool {
        !(self.top == 0 && self.bottom == 0 && self.cur_bottom == 0)
    }

    pub fn free_space(&self) -> usize {
        self.cur_bottom - self.bottom
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            name: self.name,
            top: self.top,
            bottom: self.bottom,
            cur_bottom: self.cur_bottom,
        }
    }

    /// Carve `size` bytes below the current low-water mark.
    ///
    /// Returns `None` for an absent pool or when the block would cross `bottom`;
    /// the pool is left untouched in both cases.
    pub fn alloc(&mut self, size: usize) -> Option<NonNull<u8>> {
        self.validate("alloc");
        if !self.is_present() {
            return None;
        }
        let rounded = rounded_size(size)?;
        let block = self
            .cur_bottom
            .checked_sub(BLOCK_HEADER_SIZE + rounded)
            .filter(|&block| block >= self.bottom)?;
        let header = BlockHeader {
            magic: BLOCK_MAGIC,
            size: u32::try_from(rounded).ok()?,
        };
        // The range belongs to this pool and nothing live overlaps it.
        unsafe { (block as *mut BlockHeader).write(header) };
        self.cur_bottom = block;

        let data = block + BLOCK_HEADER_SIZE;
        debug_ex!(
            "allocating {} bytes from pool {}: block @ {:#x}, data @ {:#x}",
            size,
            self.name,
            block,
            data
        );
        NonNull::new(data as *mut u8)
    }

    /// Release `ptr` if it is the most recent allocation of this pool.
    pub fn try_free(&mut self, ptr: NonNull<u8>) -> bool {
        self.validate("free");
        if !self.is_present() {
            return false;
        }
        let Some(block) = (ptr.as_ptr() as usize).checked_sub(BLOCK_HEADER_SIZE) else {
            return false;
        };
        if block != self.cur_bottom {
            return false;
        }
        // cur_bottom always points at a header written by `alloc` while a block is live.
        let header = unsafe { (block as *const BlockHeader).read() };
        let end = block + BLOCK_HEADER_SIZE + header.size as usize;
        if header.magic != BLOCK_MAGIC || end > self.top {
            panic_fatal!("allocator", "free: corrupted block metadata at {:#x}", block);
        }
        self.cur_bottom = end;
        debug_ex!("freed block @ {:#x} from pool {}", block, self.name);
        true
    }

    #[cfg(test)]
    pub(super) fn corrupt(&mut self) {
        self.magic[1] = b'X';
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rounded_size() {
        assert_eq!(BLOCK_HEADER_SIZE, 8);
        assert_eq!(rounded_size(0), Some(24));
        assert_eq!(rounded_size(24), Some(24));
        assert_eq!(rounded_size(25), Some(56));
        assert_eq!(rounded_size(4096), Some(4120));
        assert_eq!(rounded_size(usize::MAX), None);
    }

    #[test]
    fn test_absent_pool() {
        let mut pool = Pool::absent();
        assert!(!pool.is_present());
        assert_eq!(pool.alloc(16), None);
    }

    #[test]
    fn test_top_normalised() {
        let pool = Pool::new(PoolRegion {
            name: "MEM1",
            top: 0x8130_0000,
            bottom: 0x8000_4000,
        });
        let stats = pool.stats();
        assert_eq!(stats.top, 0x8130_0000 - BLOCK_HEADER_SIZE);
        assert_eq!((stats.top + BLOCK_HEADER_SIZE) % ALLOC_ALIGN, 0);
        assert!(stats.top <= 0x8130_0000);
    }

    #[test]
    #[should_panic(expected = "has no room")]
    fn test_inverted_region_is_fatal() {
        Pool::new(PoolRegion {
            name: "bogus",
            top: 0x1000,
            bottom: 0x2000,
        });
    }

    #[test]
    #[should_panic(expected = "corrupted MEM2 pool metadata")]
    fn test_corrupted_pool_magic_is_fatal() {
        let mut pool = Pool::absent();
        pool.name = "MEM2";
        pool.corrupt();
        pool.alloc(16);
    }
}
