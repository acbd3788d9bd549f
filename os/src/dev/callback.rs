//! Main-loop callbacks.
//!
//! Drivers without an interrupt to rely on poll from here. Slots are filled
//! first-free, so order is only meaningful until the first removal.
use core::ptr;

use log::warn;

use crate::{
    arch::{Cpu, CpuOps},
    config::MAX_CALLBACKS,
    sync::IrqCell,
};

pub type Callback = fn();

pub struct CallbackTable<C: CpuOps = Cpu> {
    slots: IrqCell<[Option<Callback>; MAX_CALLBACKS], C>,
}

impl<C: CpuOps> CallbackTable<C> {
    pub const fn new() -> Self {
        CallbackTable {
            slots: IrqCell::new([None; MAX_CALLBACKS]),
        }
    }

    /// Install `cb` in the first free slot. Running out of slots is fatal.
    pub fn add(&self, cb: Callback) {
        let added = self.slots.with(|slots| {
            let free = slots.iter_mut().find(|slot| slot.is_none());
            free.map(|slot| *slot = Some(cb)).is_some()
        });
        if !added {
            panic_fatal!("callbacks", "Out of callback slots");
        }
    }

    /// Clear the first slot holding `cb`.
    pub fn remove(&self, cb: Callback) {
        let removed = self.slots.with(|slots| {
            let found = slots
                .iter_mut()
                .find(|slot| slot.is_some_and(|f| ptr::fn_addr_eq(f, cb)));
            found.map(|slot| *slot = None).is_some()
        });
        if !removed {
            warn!("Tried to remove nonexistent callback {:p}", cb);
        }
    }

    /// Call every registered callback once, in slot order.
    ///
    /// Each slot is read under the guard but called outside it, so callbacks
    /// run with interrupts as the caller left them and may add or remove
    /// callbacks themselves.
    pub fn run_all(&self) {
        for index in 0..MAX_CALLBACKS {
            if let Some(cb) = self.slots.with(|slots| slots[index]) {
                cb();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.slots.with(|slots| slots.iter().flatten().count())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<C: CpuOps> Default for CallbackTable<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Callbacks run by the main loop.
pub static CALLBACKS: CallbackTable = CallbackTable::new();

pub fn add_callback(cb: Callback) {
    CALLBACKS.add(cb);
}

pub fn remove_callback(cb: Callback) {
    CALLBACKS.remove(cb);
}

pub fn run_callbacks() {
    CALLBACKS.run_all();
}
