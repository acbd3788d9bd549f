use core::fmt::Write;

use log::{LevelFilter, Log, Metadata, Record, set_logger, set_max_level};

use crate::{console::ConsoleOut, panic_fatal};

pub struct Logger;

impl Logger {
    /// Render `record` as one `[LEVEL] module: message` line.
    pub fn render(record: &Record, out: &mut dyn Write) -> core::fmt::Result {
        let target = record.target();
        let module = target
            .strip_prefix(concat!(env!("CARGO_CRATE_NAME"), "::"))
            .unwrap_or(target);
        write!(out, "[{}] {}: {}\r\n", record.level(), module, record.args())
    }
}

impl Log for Logger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let _ = Self::render(record, &mut ConsoleOut);
    }

    fn flush(&self) {}
}

pub fn init() {
    static LOGGER: Logger = Logger;
    set_logger(&LOGGER)
        .unwrap_or_else(|err| panic_fatal!("logging", "Error initializing logger: {:?}", err));
    set_max_level(if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    });
}

/// Improved debug macro,
/// only compiled in debug mode.
#[macro_export]
macro_rules! debug_ex {
    // debug_ex!(target: "my_target", "a {} event", "log")
    (target: $target:expr, $($arg:tt)+) => {
        #[cfg(debug_assertions)]
        {
            log::log!(target: $target, log::Level::Debug, $($arg)+)
        }
    };

    // debug_ex!("a {} event", "log")
    ($($arg:tt)+) => {
        #[cfg(debug_assertions)]
        {
            log::log!(log::Level::Debug, $($arg)+)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Level;
    use std::string::String;

    #[test]
    fn test_render_strips_crate_prefix() {
        let mut line = String::new();
        Logger::render(
            &Record::builder()
                .args(format_args!("pool {} ready", "MEM1"))
                .level(Level::Info)
                .target("npll::mm::allocator")
                .build(),
            &mut line,
        )
        .unwrap();
        assert_eq!(line, "[INFO] mm::allocator: pool MEM1 ready\r\n");
    }

    #[test]
    fn test_render_foreign_target() {
        let mut line = String::new();
        Logger::render(
            &Record::builder()
                .args(format_args!("x"))
                .level(Level::Warn)
                .target("sdmmc")
                .build(),
            &mut line,
        )
        .unwrap();
        assert_eq!(line, "[WARN] sdmmc: x\r\n");
    }
}
