//! Cache line arithmetic shared by every cache maintenance primitive.

use utils::num::{align_down_pow2, align_up_pow2};

/// Size of a data/instruction cache line on every supported processor.
pub const CACHE_LINE: usize = 32;

/// Iterate over the start address of every cache line touching `[addr, addr + len)`.
///
/// The range is widened to whole lines on both ends, so an unaligned range
/// that straddles a line boundary yields both lines.
pub fn cache_lines(addr: usize, len: usize) -> impl Iterator<Item = usize> {
    let start = align_down_pow2(addr, CACHE_LINE);
    let end = align_up_pow2(addr + len, CACHE_LINE);
    (start..end).step_by(CACHE_LINE)
}
