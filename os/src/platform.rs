//! Console generations and the hooks their bring-up code hands to the runtime.
use core::fmt::Arguments;

use bitflags::bitflags;
use num_enum::TryFromPrimitive;

use crate::{
    arch::{Cpu, CpuOps},
    sync::IrqCell,
};

/// Hardware generation the runtime is executing on.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
pub enum Platform {
    GameCube = 1,
    Wii = 2,
    WiiU = 3,
}

/// Hollywood revisions found in production Wii consoles.
const HW_VERSION_PROD: [u32; 2] = [0x11, 0x21];
/// Upper half of `LT_CHIPREVID` on Latte.
const LT_CHIPREVID_MAGIC: u32 = 0xcafe_0000;

impl Platform {
    /// Identify the console from the `HW_VERSION` and `LT_CHIPREVID` registers.
    ///
    /// The GameCube has no Hollywood, so `HW_VERSION` reads as garbage there.
    /// Only the Wii U has Latte and its magic chip revision.
    pub fn detect(hw_version: u32, lt_chiprevid: impl FnOnce() -> u32) -> Platform {
        if !HW_VERSION_PROD.contains(&hw_version) {
            return Platform::GameCube;
        }
        if lt_chiprevid() & 0xffff_0000 != LT_CHIPREVID_MAGIC {
            return Platform::Wii;
        }
        Platform::WiiU
    }

    pub const fn name(self) -> &'static str {
        match self {
            Platform::GameCube => "Nintendo GameCube",
            Platform::Wii => "Nintendo Wii",
            Platform::WiiU => "Nintendo Wii U",
        }
    }

    /// Driver applicability bit of this platform.
    pub const fn mask(self) -> PlatformMask {
        match self {
            Platform::GameCube => PlatformMask::GAMECUBE,
            Platform::Wii => PlatformMask::WII,
            Platform::WiiU => PlatformMask::WIIU,
        }
    }

    /// Timebase ticks per microsecond (bus clock / 4).
    pub const fn ticks_per_usec(self) -> u64 {
        match self {
            Platform::GameCube => 162 / 4,
            Platform::Wii => 243 / 4,
            Platform::WiiU => 248 / 4,
        }
    }

    /// Whether the console has a second memory pool (MEM2).
    pub const fn has_mem2(self) -> bool {
        !matches!(self, Platform::GameCube)
    }
}

bitflags! {
    /// Set of platforms a driver may be initialized on.
    pub struct PlatformMask: u8 {
        const GAMECUBE = 1 << 0;
        const WII      = 1 << 1;
        const WIIU     = 1 << 2;
        const ALL      = Self::GAMECUBE.bits | Self::WII.bits | Self::WIIU.bits;
    }
}

/// Services supplied by the active platform bring-up path.
#[derive(Clone, Copy)]
pub struct PlatformOps {
    /// Terminal action once a fatal error has been reported. Never returns.
    pub panic: fn(Arguments<'_>) -> !,
    /// Debug transport, one character at a time.
    pub debug_write_char: Option<fn(u8)>,
    /// Debug transport, whole strings.
    pub debug_write_str: Option<fn(&str)>,
}

/// Debug hooks removed from [PlatformOps] by [take_debug_output].
#[derive(Clone, Copy)]
pub struct DebugOutput {
    write_char: Option<fn(u8)>,
    write_str: Option<fn(&str)>,
}

/// Holder for the installed [PlatformOps].
pub struct PlatformSlot<C: CpuOps = Cpu> {
    ops: IrqCell<Option<PlatformOps>, C>,
}

impl<C: CpuOps> PlatformSlot<C> {
    pub const fn new() -> Self {
        PlatformSlot {
            ops: IrqCell::new(None),
        }
    }

    /// Install the bring-up path's operations. Replaces any previous set.
    pub fn install(&self, ops: PlatformOps) {
        self.ops.set(Some(ops));
    }

    /// The installed operations, if bring-up has provided any.
    pub fn ops(&self) -> Option<PlatformOps> {
        self.ops.get()
    }

    /// Detach the debug transport, leaving the rest of the ops in place.
    pub fn take_debug_output(&self) -> DebugOutput {
        self.ops.with(|ops| match ops {
            Some(ops) => DebugOutput {
                write_char: ops.debug_write_char.take(),
                write_str: ops.debug_write_str.take(),
            },
            None => DebugOutput {
                write_char: None,
                write_str: None,
            },
        })
    }

    /// Re-attach hooks from [PlatformSlot::take_debug_output]. Nothing
    /// happens when no ops are installed.
    pub fn restore_debug_output(&self, saved: DebugOutput) {
        self.ops.with(|ops| {
            if let Some(ops) = ops {
                ops.debug_write_char = saved.write_char;
                ops.debug_write_str = saved.write_str;
            }
        })
    }
}

impl<C: CpuOps> Default for PlatformSlot<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Operations of the running console.
pub static PLATFORM: PlatformSlot = PlatformSlot::new();

pub fn install_ops(ops: PlatformOps) {
    PLATFORM.install(ops);
}

pub fn ops() -> Option<PlatformOps> {
    PLATFORM.ops()
}

/// Detach the debug transport from the platform ops.
///
/// Used by drivers whose probing shares hardware with the debug transport;
/// hand the result back to [restore_debug_output] when done.
pub fn take_debug_output() -> DebugOutput {
    PLATFORM.take_debug_output()
}

pub fn restore_debug_output(saved: DebugOutput) {
    PLATFORM.restore_debug_output(saved);
}
