//! External interrupt sources and their handlers.
use bitflags::bitflags;
use num_enum::TryFromPrimitive;

use crate::{
    arch::{Cpu, CpuOps},
    sync::IrqCell,
    trap::intc::IntcDev,
};

/// Interrupt sources the runtime knows how to route.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
pub enum IrqSource {
    /// GPIOs owned by the PowerPC.
    GpioB = 0,
    /// GPIOs owned by the security processor.
    Gpio = 1,
}

impl IrqSource {
    pub const COUNT: usize = 2;

    /// Bit of the source in the interrupt controller's flag register.
    pub const fn bit(self) -> IrqSources {
        match self {
            IrqSource::GpioB => IrqSources::GPIOB,
            IrqSource::Gpio => IrqSources::GPIO,
        }
    }
}

bitflags! {
    /// Set of interrupt sources, laid out like the Hollywood flag register.
    pub struct IrqSources: u32 {
        const GPIOB = 1 << 10;
        const GPIO  = 1 << 11;
    }
}

pub type IrqHandler = fn(IrqSource);

/// At most one handler per [IrqSource].
///
/// Handlers are never unregistered; drivers tearing down mask interrupts
/// globally instead (see [IrqTable::disable_all]).
pub struct IrqTable<C: CpuOps = Cpu> {
    handlers: IrqCell<[Option<IrqHandler>; IrqSource::COUNT], C>,
}

impl<C: CpuOps> IrqTable<C> {
    pub const fn new() -> Self {
        IrqTable {
            handlers: IrqCell::new([None; IrqSource::COUNT]),
        }
    }

    /// Attach `handler` to `source`. A second handler for the same source is fatal.
    pub fn register(&self, source: IrqSource, handler: IrqHandler) {
        let vacant = self.handlers.with(|handlers| {
            let slot = &mut handlers[source as usize];
            slot.is_none().then(|| *slot = Some(handler)).is_some()
        });
        if !vacant {
            panic_fatal!("irq", "handler for {:?} registered twice", source);
        }
    }

    pub fn is_registered(&self, source: IrqSource) -> bool {
        self.handlers.with(|handlers| handlers[source as usize].is_some())
    }

    /// Service every source that is pending on `intc` and has a handler.
    ///
    /// Each serviced source is acknowledged right after its handler returns;
    /// pending sources without a handler are left for the next interrupt.
    /// Returns how many sources were serviced.
    pub fn route(&self, intc: &dyn IntcDev) -> usize {
        let pending = intc.pending();
        let handlers = self.handlers.get();
        let mut serviced = 0;
        for (index, handler) in handlers.iter().enumerate() {
            let (Ok(source), Some(handler)) = (IrqSource::try_from(index as u8), handler) else {
                continue;
            };
            if pending.contains(source.bit()) {
                handler(source);
                intc.complete(source);
                serviced += 1;
            }
        }
        serviced
    }

    /// Turn external interrupts off altogether.
    pub fn disable_all(&self) {
        C::disable_interrupts();
    }
}

impl<C: CpuOps> Default for IrqTable<C> {
    fn default() -> Self {
        Self::new()
    }
}
