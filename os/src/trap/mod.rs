//! Exceptions and external interrupts.
//!
//! Installation happens once, from mainline code, before interrupts are ever
//! enabled. Afterwards every exception lands in [handle_exception] with
//! interrupts masked; it never nests and never waits.
use core::ptr::NonNull;

use spin::Once;

use crate::{
    arch::{self, Cpu},
    config::{CACHED_BASE, LOW_MEMORY_SIZE},
};

pub mod handler;
pub mod intc;
pub mod intr;
pub mod vectors;

use handler::{Handled, SavedRegs, StackReader};
use intc::IntcDev;
use intr::{IrqHandler, IrqSource, IrqTable};
use vectors::{LowMemory, Vectors};

pub static VECTORS: Vectors = Vectors::new();

pub static IRQS: IrqTable = IrqTable::new();

static INTC: Once<&'static dyn IntcDev> = Once::new();

/// The exception region at the bottom of the cached address space.
///
/// # Safety
/// Only valid on the console, where it is owned by the exception subsystem.
pub unsafe fn low_memory() -> LowMemory {
    // CACHED_BASE is a non-zero constant.
    let base = unsafe { NonNull::new_unchecked(CACHED_BASE as *mut u8) };
    unsafe { LowMemory::new(base, LOW_MEMORY_SIZE) }
}

/// Install the exception vectors into `mem`.
pub fn init(mem: &LowMemory) {
    VECTORS.install(mem, arch::exception_body());
}

/// Reset `intc` and route external interrupts through it. Only once.
pub fn install_intc(intc: &'static dyn IntcDev) {
    if INTC.is_completed() {
        panic_fatal!("irq", "interrupt controller installed twice");
    }
    intc.reset();
    INTC.call_once(|| intc);
}

pub fn register_handler(source: IrqSource, handler: IrqHandler) {
    IRQS.register(source, handler);
}

pub fn enable() {
    VECTORS.enable();
}

pub fn disable() {
    VECTORS.disable();
}

/// Entry from the shared exception body. Returns only for recoverable exceptions.
pub fn handle_exception(vector: u32, regs: &SavedRegs, stack: &dyn StackReader) -> Handled {
    handler::dispatch::<Cpu>(vector, &IRQS, INTC.get().copied(), regs, stack)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        arch::{CpuOps, mock::MockCpu},
        trap::{
            handler::{dispatch, tests::FakeStack},
            intr::{
                IrqSources,
                tests::{MockIntc, SEEN, record},
            },
            vectors::tests::{BODY, FakeLowMemory},
        },
    };
    use std::vec;

    #[test]
    fn test_external_interrupt_vector_routes_to_handlers() {
        let mut fake = FakeLowMemory::new();
        let mem = fake.view();
        let vectors = Vectors::<MockCpu>::new();
        vectors.install(&mem, &BODY);
        vectors.enable();

        let irqs = IrqTable::<MockCpu>::new();
        let intc = MockIntc::default();
        irqs.register(IrqSource::GpioB, record);
        intc.raise(IrqSources::GPIOB);

        // What the stub at 0x500 hands to the shared body.
        let stub = Vectors::<MockCpu>::decode_stub(&mem, 0x500).unwrap();
        MockCpu::disable_interrupts();
        let handled = dispatch(
            stub.vector,
            &irqs,
            Some(&intc),
            &SavedRegs::default(),
            &FakeStack::default(),
        );

        assert_eq!(handled, Handled::External { serviced: 1 });
        assert_eq!(SEEN.with(|s| s.borrow().clone()), vec![IrqSource::GpioB]);
        assert_eq!(*intc.completed.borrow(), vec![IrqSource::GpioB]);
        assert!(intc.pending().is_empty());
    }
}
