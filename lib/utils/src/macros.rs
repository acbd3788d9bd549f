//! Macros for defining wrapper structs with forced alignment.

/// Defines a `#[repr(C, align)]` newtype with [Deref](core::ops::Deref) and
/// [DerefMut](core::ops::DerefMut) to the wrapped value.
///
/// Useful for statically reserved memory (stacks, DMA buffers) that hardware
/// requires to start on a particular boundary.
#[macro_export]
macro_rules! define_aligned {
    ($vis: vis $name: ident, $type: ty, $align: expr) => {
        #[allow(missing_docs)]
        #[repr(C)]
        #[repr(align($align))]
        $vis struct $name(pub $type);

        impl core::ops::Deref for $name {
            type Target = $type;
            #[inline(always)]
            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl core::ops::DerefMut for $name {
            #[inline(always)]
            fn deref_mut(&mut self) -> &mut Self::Target {
                &mut self.0
            }
        }
    };
}
