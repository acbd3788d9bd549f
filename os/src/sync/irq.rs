//! Interrupt-mask critical sections.
//!
//! [disable_and_save] / [restore] are **not** a lock: nesting works only because
//! an inner `restore(false)` is a no-op, leaving the flag clear until the
//! outermost `restore(true)`. Every `disable_and_save` must be paired with exactly
//! one `restore` of the value it returned, in reverse nesting order.
//! [IrqGuard] does that pairing through `Drop`.
use core::marker::PhantomData;

use crate::arch::{Cpu, CpuOps};

/// Clear the interrupt-enable flag and report whether it was set.
#[inline]
pub fn disable_and_save<C: CpuOps>() -> bool {
    let was_enabled = C::interrupts_enabled();
    if was_enabled {
        C::disable_interrupts();
    }
    was_enabled
}

/// Undo a [disable_and_save]: set the flag again only if it was set before.
#[inline]
pub fn restore<C: CpuOps>(was_enabled: bool) {
    if was_enabled {
        C::enable_interrupts();
    }
}

/// Scope guard keeping external interrupts masked while alive.
///
/// Not `Send`: the saved state belongs to the context that created it.
#[must_use = "interrupts are restored as soon as the guard is dropped"]
pub struct IrqGuard<C: CpuOps = Cpu> {
    was_enabled: bool,
    _cpu: PhantomData<*const C>,
}

impl<C: CpuOps> IrqGuard<C> {
    pub fn new() -> IrqGuard<C> {
        IrqGuard {
            was_enabled: disable_and_save::<C>(),
            _cpu: PhantomData,
        }
    }

    /// Whether interrupts were enabled when the guard was taken.
    pub fn was_enabled(&self) -> bool {
        self.was_enabled
    }
}

impl<C: CpuOps> Drop for IrqGuard<C> {
    fn drop(&mut self) {
        restore::<C>(self.was_enabled);
    }
}
