//! Interrupt controllers.
//!
//! The PowerPC sees one external interrupt line. Behind it sit the Flipper
//! processor interface (every console), the Hollywood controller cascaded
//! into it (Wii and Wii U) and the per-core Latte controllers (Wii U).
use log::info;

use crate::{
    dev::mmio::Register,
    platform::Platform,
    trap::intr::{IrqSource, IrqSources},
};

/// An interrupt controller the router can query and acknowledge.
pub trait IntcDev: Sync {
    /// Mask and acknowledge everything, then unmask the routed sources.
    fn reset(&self);
    /// Sources currently asserting an interrupt.
    fn pending(&self) -> IrqSources;
    /// Acknowledge `source`.
    fn complete(&self, source: IrqSource);
}

mod regs {
    pub const PI_INTSR: usize = 0xcc00_3000;
    pub const PI_INTMR: usize = 0xcc00_3004;
    /// Hollywood cascade in the Flipper interrupt registers.
    pub const PI_IRQ_HOLLYWOOD: u32 = 1 << 14;

    pub const HW_PPCIRQFLAG: usize = 0xcd80_0030;
    pub const HW_PPCIRQMASK: usize = 0xcd80_0034;

    pub const LT_PPC_INT_BASE: usize = 0xcd80_0440;
    pub const LT_PPC_INT_STRIDE: usize = 0x10;
    pub const LT_INT1STS: usize = 0x0;
    pub const LT_INT2STS: usize = 0x4;
    pub const LT_INT1EN: usize = 0x8;
    pub const LT_INT2EN: usize = 0xc;
    pub const LT_CORES: usize = 3;
}

/// The controllers of the running console.
pub struct PlatformPic {
    platform: Platform,
}

impl PlatformPic {
    pub const fn new(platform: Platform) -> Self {
        PlatformPic { platform }
    }

    fn reg(addr: usize) -> &'static Register<u32> {
        // Fixed, always-mapped controller registers.
        unsafe { Register::at(addr) }
    }

    fn has_hollywood(&self) -> bool {
        matches!(self.platform, Platform::Wii | Platform::WiiU)
    }
}

impl IntcDev for PlatformPic {
    fn reset(&self) {
        let intmr = Self::reg(regs::PI_INTMR);
        intmr.write(0);
        Self::reg(regs::PI_INTSR).ack_all();

        if self.has_hollywood() {
            intmr.modify(|mask| mask | regs::PI_IRQ_HOLLYWOOD);

            let mask = Self::reg(regs::HW_PPCIRQMASK);
            mask.write(0);
            Self::reg(regs::HW_PPCIRQFLAG).ack_all();
            mask.modify(|m| m | (IrqSources::GPIOB | IrqSources::GPIO).bits());
        }

        if self.platform == Platform::WiiU {
            for core in 0..regs::LT_CORES {
                let base = regs::LT_PPC_INT_BASE + core * regs::LT_PPC_INT_STRIDE;
                Self::reg(base + regs::LT_INT1EN).write(0);
                Self::reg(base + regs::LT_INT2EN).write(0);
                Self::reg(base + regs::LT_INT1STS).ack_all();
                Self::reg(base + regs::LT_INT2STS).ack_all();
            }
        }
        info!("interrupt controllers of the {} reset", self.platform.name());
    }

    fn pending(&self) -> IrqSources {
        if !self.has_hollywood() {
            return IrqSources::empty();
        }
        IrqSources::from_bits_truncate(Self::reg(regs::HW_PPCIRQFLAG).read())
    }

    fn complete(&self, source: IrqSource) {
        if self.has_hollywood() {
            Self::reg(regs::HW_PPCIRQFLAG).write(source.bit().bits());
        }
    }
}
