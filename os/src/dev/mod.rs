//! Drivers and the services they are built on.

pub mod callback;
pub mod debug_console;
pub mod driver;
pub mod memlog;
pub mod mmio;
pub mod output;

pub use driver::{Driver, DriverClass, DriverOps, DriverState, DriverTable};
