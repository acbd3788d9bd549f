//! Uniprocessor interior mutability primitives
use core::{cell::RefCell, fmt::Debug, marker::PhantomData};

use crate::{
    arch::{Cpu, CpuOps},
    sync::IrqGuard,
};

/// Wrap a static data structure shared between mainline code and interrupt
/// handlers.
///
/// Every access runs inside an [IrqGuard], so an interrupt handler can never
/// observe a half-written value. Accessing the same cell again from inside
/// the closure is a bug and panics.
///
/// Adapted from `UPSafeCell` in the rCore project.
pub struct IrqCell<T, C: CpuOps = Cpu> {
    /// inner data
    inner: RefCell<T>,
    _cpu: PhantomData<fn() -> C>,
}

// Single hardware thread; the only other context is excluded by the guard.
unsafe impl<T: Send, C: CpuOps> Sync for IrqCell<T, C> {}

impl<T, C: CpuOps> IrqCell<T, C> {
    pub const fn new(value: T) -> Self {
        Self {
            inner: RefCell::new(value),
            _cpu: PhantomData,
        }
    }

    /// Run `f` on the inner value with interrupts masked.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let _guard = IrqGuard::<C>::new();
        #[cfg(test)]
        LAST_ACCESS_IRQS.with(|last| last.set(Some(C::interrupts_enabled())));
        let mut inner = self.inner.borrow_mut();
        f(&mut inner)
    }
}

#[cfg(test)]
std::thread_local! {
    static LAST_ACCESS_IRQS: core::cell::Cell<Option<bool>> = const { core::cell::Cell::new(None) };
}

/// Interrupt state seen by the most recent [IrqCell] access on this thread,
/// cleared on read.
#[cfg(test)]
pub(crate) fn take_last_access_irqs() -> Option<bool> {
    LAST_ACCESS_IRQS.with(|last| last.take())
}

impl<T: Copy, C: CpuOps> IrqCell<T, C> {
    /// Copy the inner value out.
    pub fn get(&self) -> T {
        self.with(|inner| *inner)
    }

    /// Overwrite the inner value.
    pub fn set(&self, value: T) {
        self.with(|inner| *inner = value)
    }
}

impl<T: Debug, C: CpuOps> Debug for IrqCell<T, C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("IrqCell").field("inner", &self.inner).finish()
    }
}
