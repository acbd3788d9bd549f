//! This module defines traits for some commonly used error types

use core::fmt::{Debug, Display, Write};

/// An error that can be printed to an output device
pub trait MessageError: Debug {
    /// Print the error message to a writer
    fn print_to_writer(&self, f: &mut dyn Write) {
        // Output devices drop what they cannot take; nothing to recover here.
        let _ = f.write_fmt(format_args!("{:?}", self));
    }
}

impl Display for dyn MessageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.print_to_writer(f);
        Ok(())
    }
}

/// A bounded wait ran out of time before its condition held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutError {
    /// The budget that was exhausted, in microseconds.
    pub timeout_us: u64,
}

impl MessageError for TimeoutError {
    fn print_to_writer(&self, f: &mut dyn Write) {
        let _ = write!(f, "timed out after {}us", self.timeout_us);
    }
}
