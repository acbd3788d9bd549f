//! npll boot runtime
//!
//! Kernel runtime substrate for the PowerPC console family: a downward-growing
//! pool allocator, a staged driver registry with a main-loop callback
//! scheduler, and the exception/interrupt subsystem with its critical-section
//! primitive.
#![cfg_attr(not(test), no_std)]
#![cfg_attr(target_arch = "powerpc", feature(asm_experimental_arch))]

#[macro_use]
pub mod console;
#[macro_use]
pub mod logging;
#[macro_use]
pub mod panic;

pub mod arch;
pub mod boot;
pub mod config;
pub mod dev;
pub mod error;
pub mod mm;
pub mod platform;
pub mod sync;
pub mod timer;
pub mod trap;
