//! Driver registry and staged initialization.
//!
//! Drivers are static descriptors collected in one table at build time. The
//! stager walks the whole table once per [DriverClass], oldest class first,
//! and calls `init` on every driver of that class or an earlier one that is
//! not settled yet. A driver waiting on a dependency reports
//! [DriverState::NeedDep] and simply gets another attempt on the next pass;
//! there is no dependency graph.
//!
//! Drivers are only retried when the class advances. Two drivers of the same
//! class that depend on each other are never resolved.
use core::sync::atomic::{AtomicU8, Ordering};

use log::{info, warn};
use num_enum::TryFromPrimitive;

use crate::platform::PlatformMask;

/// Lifecycle of a driver.
///
/// `NotReady -> Initializing -> {Ready | Faulted | NoHardware | NeedDep}`.
/// `NeedDep` may be retried by the stager; the other outcomes stick until the
/// driver is cleaned up.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
pub enum DriverState {
    NotReady = 0,
    Initializing = 1,
    Faulted = 2,
    NoHardware = 3,
    NeedDep = 4,
    Ready = 5,
}

impl DriverState {
    /// Whether the stager has nothing left to do for a driver in this state.
    pub const fn is_settled(self) -> bool {
        matches!(
            self,
            DriverState::Ready
                | DriverState::NoHardware
                | DriverState::Faulted
                | DriverState::Initializing
        )
    }
}

/// Staging priority. Earlier classes are initialized first.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, TryFromPrimitive)]
pub enum DriverClass {
    Critical = 0,
    Block = 1,
    Filesystem = 2,
    Graphics = 3,
    Input = 4,
    Other = 5,
}

impl DriverClass {
    pub const ALL: [DriverClass; 6] = [
        DriverClass::Critical,
        DriverClass::Block,
        DriverClass::Filesystem,
        DriverClass::Graphics,
        DriverClass::Input,
        DriverClass::Other,
    ];
}

/// Lifecycle hooks implemented by drivers.
///
/// `init` must leave a state on `drv` before returning. `cleanup` releases
/// everything `init` registered (callbacks, output devices); the registry
/// resets the state afterwards.
pub trait DriverOps: Sync {
    fn init(&self, drv: &Driver);
    fn cleanup(&self, drv: &Driver);
}

/// Static descriptor of one driver.
pub struct Driver<'a> {
    pub name: &'static str,
    /// Platforms the driver may be initialized on.
    pub mask: PlatformMask,
    pub class: DriverClass,
    state: AtomicU8,
    ops: &'a dyn DriverOps,
}

impl<'a> Driver<'a> {
    pub const fn new(
        name: &'static str,
        mask: PlatformMask,
        class: DriverClass,
        ops: &'a dyn DriverOps,
    ) -> Self {
        Driver {
            name,
            mask,
            class,
            state: AtomicU8::new(DriverState::NotReady as u8),
            ops,
        }
    }

    /// Current state. A byte that is not a state means the registry is corrupted.
    pub fn state(&self) -> DriverState {
        let raw = self.state.load(Ordering::Acquire);
        DriverState::try_from(raw).unwrap_or_else(|_| {
            panic_fatal!(
                "drivers",
                "corrupted registry: driver {} has state {:#x}",
                self.name,
                raw
            )
        })
    }

    pub fn set_state(&self, state: DriverState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub fn is_ready(&self) -> bool {
        self.state() == DriverState::Ready
    }

    #[cfg(test)]
    fn set_raw_state(&self, raw: u8) {
        self.state.store(raw, Ordering::Release);
    }
}

impl core::fmt::Debug for Driver<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Driver")
            .field("name", &self.name)
            .field("class", &self.class)
            .field("state", &self.state.load(Ordering::Relaxed))
            .finish()
    }
}

/// The table of every driver linked into the image, in staging order.
#[derive(Clone, Copy)]
pub struct DriverTable<'a> {
    drivers: &'a [&'a Driver<'a>],
}

impl<'a> DriverTable<'a> {
    pub const fn new(drivers: &'a [&'a Driver<'a>]) -> Self {
        DriverTable { drivers }
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a Driver<'a>> + '_ {
        self.drivers.iter().copied()
    }

    /// Look a driver up by name.
    pub fn get(&self, name: &str) -> Option<&'a Driver<'a>> {
        self.iter().find(|drv| drv.name == name)
    }

    /// Initialize every driver applicable to `platform`, class by class.
    ///
    /// A driver that ends up faulted, absent or still waiting never stops the
    /// others from being attempted. Drivers left at `NeedDep` are not retried
    /// once this returns.
    pub fn stage_init(&self, platform: PlatformMask) {
        info!("staging {} drivers", self.drivers.len());
        for class in DriverClass::ALL {
            debug_ex!("working on driver class {:?}", class);
            for drv in self.iter() {
                let state = drv.state();
                if state.is_settled() {
                    debug_ex!("  {}: skipping, state is {:?}", drv.name, state);
                    continue;
                }
                if !drv.mask.intersects(platform) {
                    debug_ex!("  {}: skipping, not valid on this platform", drv.name);
                    continue;
                }
                if drv.class > class {
                    debug_ex!("  {}: skipping, class {:?} comes later", drv.name, drv.class);
                    continue;
                }

                drv.set_state(DriverState::Initializing);
                drv.ops.init(drv);
                match drv.state() {
                    DriverState::Initializing => {
                        warn!("{}: init did not report a state, retrying later", drv.name);
                        drv.set_state(DriverState::NotReady);
                    }
                    state => {
                        debug_ex!("  {}: {:?}", drv.name, state);
                    }
                }
            }
        }
        for drv in self.iter() {
            let state = drv.state();
            if state != DriverState::Ready && drv.mask.intersects(platform) {
                info!("driver {} did not come up: {:?}", drv.name, state);
            }
        }
    }

    /// Tear `drv` down and return it to [DriverState::NotReady].
    pub fn cleanup(&self, drv: &Driver) {
        if drv.state() == DriverState::NotReady {
            return;
        }
        debug_ex!("cleaning up driver {}", drv.name);
        drv.ops.cleanup(drv);
        drv.set_state(DriverState::NotReady);
    }

    /// Tear every driver down, last in the table first.
    pub fn cleanup_all(&self) {
        for drv in self.drivers.iter().rev() {
            self.cleanup(drv);
        }
    }
}
