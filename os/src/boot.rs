//! Bring-up shared by every console, and the main loop.
use log::info;

use crate::{
    config::{self, PlatformConfig},
    dev::{DriverTable, callback, debug_console},
    logging, mm,
    platform::{self, PlatformOps},
    trap::{self, intc::IntcDev},
};

/// Bring the runtime up once the platform is known.
///
/// Order matters: output first so everything after can report, the vectors
/// and pools before any driver runs, interrupts only once drivers had a
/// chance to register their handlers.
pub fn init_common(
    config: PlatformConfig,
    ops: PlatformOps,
    drivers: DriverTable<'static>,
    intc: &'static dyn IntcDev,
) {
    platform::install_ops(ops);
    let config = config::publish(config);
    debug_console::init();
    logging::init();
    info!("npll on {}", config.platform.name());

    // Only ever called on the console itself.
    let low = unsafe { trap::low_memory() };
    trap::init(&low);
    mm::init(config);
    trap::install_intc(intc);

    drivers.stage_init(config.platform.mask());
    trap::enable();
    info!("Driver initialization done, entering main loop");
}

/// Poll callbacks and the idle hook forever.
pub fn main_loop(idle: fn()) -> ! {
    loop {
        callback::run_callbacks();
        idle();
    }
}
