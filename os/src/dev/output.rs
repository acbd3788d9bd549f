//! Character output devices.
//!
//! Everything the runtime prints is broadcast to every registered device in
//! registration order. Devices are static descriptors, compared by address.
use core::{
    fmt::{self, Arguments, Write},
    ptr,
};

use log::{info, warn};

use crate::{
    arch::{Cpu, CpuOps},
    config::MAX_OUTPUT_DEVICES,
    sync::IrqCell,
};

/// A sink for text output.
pub struct OutputDevice {
    pub name: Option<&'static str>,
    /// Whether the device draws to a display (and may need flushing).
    pub is_graphical: bool,
    pub rows: u16,
    pub columns: u16,
    /// Name of the driver owning the device, if any.
    pub driver: Option<&'static str>,
    pub write_char: fn(u8),
    pub write_str: fn(&str),
}

type Slots = [Option<&'static OutputDevice>; MAX_OUTPUT_DEVICES];

/// Fixed-capacity, ordered list of output devices.
pub struct OutputTable<C: CpuOps = Cpu> {
    devices: IrqCell<Slots, C>,
}

impl<C: CpuOps> OutputTable<C> {
    pub const fn new() -> Self {
        OutputTable {
            devices: IrqCell::new([None; MAX_OUTPUT_DEVICES]),
        }
    }

    /// Append `dev` to the table. A full table is fatal.
    pub fn add(&self, dev: &'static OutputDevice) {
        info!(
            "Adding new device: {} [driver: {}]",
            dev.name.unwrap_or("NULL"),
            dev.driver.unwrap_or("NULL")
        );
        let added = self.devices.with(|slots| {
            let free = slots.iter_mut().find(|slot| slot.is_none());
            free.map(|slot| *slot = Some(dev)).is_some()
        });
        if !added {
            panic_fatal!("output", "Trying to add too many output devices");
        }
    }

    /// Remove `dev`, keeping the order of the remaining devices.
    pub fn remove(&self, dev: &'static OutputDevice) {
        let removed = self.devices.with(|slots| {
            let Some(index) = slots
                .iter()
                .position(|slot| slot.is_some_and(|d| ptr::eq(d, dev)))
            else {
                return false;
            };
            slots.copy_within(index + 1.., index);
            slots[MAX_OUTPUT_DEVICES - 1] = None;
            true
        });
        if !removed {
            warn!(
                "Removing output device {} which was never added",
                dev.name.unwrap_or("NULL")
            );
        }
    }

    pub fn len(&self) -> usize {
        self.devices.with(|slots| slots.iter().flatten().count())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether any registered device draws to a display.
    pub fn has_graphical(&self) -> bool {
        self.devices
            .with(|slots| slots.iter().flatten().any(|d| d.is_graphical))
    }

    /// Write `s` to every device.
    ///
    /// The table is copied out first: devices run with interrupts in
    /// whatever state the caller left them and may print themselves.
    pub fn write_str(&self, s: &str) {
        for dev in self.devices.get().iter().flatten() {
            (dev.write_str)(s);
        }
    }

    pub fn write_char(&self, c: u8) {
        for dev in self.devices.get().iter().flatten() {
            (dev.write_char)(c);
        }
    }

    /// Format `args` straight to every device.
    pub fn print(&self, args: Arguments) {
        // The sink never fails; a formatting error can only come from a Display impl.
        let _ = TableWriter(self).write_fmt(args);
    }
}

struct TableWriter<'a, C: CpuOps>(&'a OutputTable<C>);

impl<C: CpuOps> Write for TableWriter<'_, C> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.write_str(s);
        Ok(())
    }
}

impl<C: CpuOps> Default for OutputTable<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Devices all console output goes to.
pub static OUTPUTS: OutputTable = OutputTable::new();

pub fn add_device(dev: &'static OutputDevice) {
    OUTPUTS.add(dev);
}

pub fn remove_device(dev: &'static OutputDevice) {
    OUTPUTS.remove(dev);
}
