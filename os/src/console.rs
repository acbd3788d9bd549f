//! Formatted printing to every output device.
use core::fmt::{Arguments, Write};

use crate::dev::output::OUTPUTS;

/// [Write] adaptor over the global output device table.
pub struct ConsoleOut;

impl Write for ConsoleOut {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        OUTPUTS.write_str(s);
        Ok(())
    }
}

pub fn print(args: Arguments) {
    OUTPUTS.print(args);
}

#[macro_export]
/// print string macro
macro_rules! kprint {
    ($fmt: literal $(, $($arg: tt)+)?) => {
        $crate::console::print(format_args!($fmt $(, $($arg)+)?))
    }
}

#[macro_export]
macro_rules! kprintln {
    ($fmt: literal $(, $($arg: tt)+)?) => {
        $crate::console::print(format_args!(concat!($fmt, "\r\n") $(, $($arg)+)?))
    }
}
