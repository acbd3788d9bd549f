//! Memory-mapped hardware registers.
use core::{
    cell::UnsafeCell,
    ptr::{read_volatile, write_volatile},
};

/// One device register. Every access is a single volatile load or store.
#[repr(transparent)]
pub struct Register<T: Sized + Copy> {
    inner: UnsafeCell<T>,
}

impl<T: Sized + Copy> Register<T> {
    /// View the register at `addr`.
    ///
    /// # Safety
    /// `addr` must be a mapped, suitably aligned register of width `T` that
    /// stays mapped for the rest of the program.
    pub unsafe fn at(addr: usize) -> &'static Register<T> {
        unsafe { &*(addr as *const Register<T>) }
    }

    #[inline(always)]
    pub fn read(&self) -> T {
        unsafe { read_volatile(self.inner.get()) }
    }

    #[inline(always)]
    pub fn write(&self, value: T) {
        unsafe {
            write_volatile(self.inner.get(), value);
        }
    }

    /// Read, transform, write back.
    #[inline(always)]
    pub fn modify(&self, f: impl FnOnce(T) -> T) {
        self.write(f(self.read()));
    }
}

impl Register<u32> {
    /// Write back the bits currently set, for write-one-to-clear status registers.
    #[inline(always)]
    pub fn ack_all(&self) {
        self.write(self.read());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_access() {
        let mut backing = [0u32; 2];
        let reg = unsafe { Register::<u32>::at(backing.as_mut_ptr() as usize + 4) };
        reg.write(0x10);
        reg.modify(|v| v | 0x1);
        assert_eq!(reg.read(), 0x11);
        reg.ack_all();
        assert_eq!(reg.read(), 0x11);
        assert_eq!(backing[0], 0);
    }
}
