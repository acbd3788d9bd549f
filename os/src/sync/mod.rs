//! Synchronization between mainline code and interrupt context.
//!
//! There is a single hardware thread, so the only thing to exclude is the
//! interrupt handler. Nothing in here spins or counts.

mod irq;
mod local;

pub use irq::*;
pub use local::*;
