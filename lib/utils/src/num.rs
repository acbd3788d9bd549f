//! Numeric Utilities
use core::ops::{Add, Rem, Sub};

/// A trait for aligning numerical values.
///
/// Provides methods to align values up or down to the nearest multiple of a given alignment.
pub trait AlignableTo {
    /// Aligns the value up to the nearest multiple of `align`.
    fn align_up(self, align: Self) -> Self;

    /// Aligns the value down to the nearest multiple of `align`.
    fn align_down(self, align: Self) -> Self;

    /// Whether the value is already a multiple of `align`.
    fn is_aligned_to(self, align: Self) -> bool;
}

impl<T> AlignableTo for T
where
    T: Copy + Rem<Output = T> + Add<Output = T> + PartialEq<T> + Default + Sub<Output = T>,
{
    fn align_up(self, align: Self) -> Self {
        if self % align == T::default() {
            self
        } else {
            self + (align - (self % align))
        }
    }
    fn align_down(self, align: Self) -> Self {
        if self % align == T::default() {
            self
        } else {
            self - (self % align)
        }
    }
    fn is_aligned_to(self, align: Self) -> bool {
        self % align == T::default()
    }
}

/// `const` flavour of [AlignableTo::align_up] for power-of-two alignments.
#[inline(always)]
pub const fn align_up_pow2(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

/// `const` flavour of [AlignableTo::align_down] for power-of-two alignments.
#[inline(always)]
pub const fn align_down_pow2(value: usize, align: usize) -> usize {
    value & !(align - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_generic() {
        assert_eq!(13usize.align_up(8), 16);
        assert_eq!(16usize.align_up(8), 16);
        assert_eq!(13usize.align_down(8), 8);
        assert_eq!(40u32.align_up(24), 48);
        assert!(64usize.is_aligned_to(32));
        assert!(!72usize.is_aligned_to(32));
    }

    #[test]
    fn test_align_pow2() {
        assert_eq!(align_up_pow2(0, 32), 0);
        assert_eq!(align_up_pow2(1, 32), 32);
        assert_eq!(align_up_pow2(4104, 32), 4128);
        assert_eq!(align_down_pow2(0x8000_001f, 32), 0x8000_0000);
    }
}
