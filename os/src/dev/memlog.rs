//! In-memory log.
//!
//! Keeps a linear copy of everything printed so it can be read back by a
//! debugger or a later stage. Output past the end of the buffer is dropped.
use crate::{
    arch::{Cpu, CpuOps},
    config::MEMLOG_SIZE,
    dev::{
        callback,
        driver::{Driver, DriverClass, DriverOps, DriverState},
        output::{self, OutputDevice},
    },
    platform::PlatformMask,
    sync::IrqCell,
};

struct LogBuffer<const N: usize> {
    data: [u8; N],
    len: usize,
}

pub struct Memlog<C: CpuOps = Cpu, const N: usize = MEMLOG_SIZE> {
    buf: IrqCell<LogBuffer<N>, C>,
}

impl<C: CpuOps, const N: usize> Memlog<C, N> {
    pub const fn new() -> Self {
        Memlog {
            buf: IrqCell::new(LogBuffer { data: [0; N], len: 0 }),
        }
    }

    pub fn write_str(&self, s: &str) {
        self.buf.with(|buf| {
            let room = N - buf.len;
            let take = s.len().min(room);
            buf.data[buf.len..buf.len + take].copy_from_slice(&s.as_bytes()[..take]);
            buf.len += take;
        })
    }

    pub fn write_char(&self, c: u8) {
        self.buf.with(|buf| {
            if buf.len < N {
                buf.data[buf.len] = c;
                buf.len += 1;
            }
        })
    }

    /// Push everything logged so far out of the data cache, so it can be read
    /// from memory without the processor's help.
    pub fn flush(&self) {
        let (addr, len) = self
            .buf
            .with(|buf| (buf.data.as_ptr() as usize, buf.len));
        if len > 0 {
            C::flush_dcache(addr, len);
        }
    }

    /// Run `f` on everything logged so far.
    pub fn with_contents<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        self.buf.with(|buf| f(&buf.data[..buf.len]))
    }

    pub fn len(&self) -> usize {
        self.buf.with(|buf| buf.len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<C: CpuOps, const N: usize> Default for Memlog<C, N> {
    fn default() -> Self {
        Self::new()
    }
}

pub static MEMLOG: Memlog = Memlog::new();

fn memlog_write_str(s: &str) {
    MEMLOG.write_str(s);
}

fn memlog_write_char(c: u8) {
    MEMLOG.write_char(c);
}

fn memlog_poll() {
    MEMLOG.flush();
}

static OUTPUT: OutputDevice = OutputDevice {
    name: Some("memlog"),
    is_graphical: false,
    rows: 25,
    columns: 80,
    driver: Some("memlog"),
    write_char: memlog_write_char,
    write_str: memlog_write_str,
};

struct MemlogOps;

impl DriverOps for MemlogOps {
    fn init(&self, drv: &Driver) {
        callback::add_callback(memlog_poll);
        MEMLOG.write_str("In-Memory logger is now active\r\n");
        output::add_device(&OUTPUT);
        drv.set_state(DriverState::Ready);
    }

    fn cleanup(&self, _drv: &Driver) {
        output::remove_device(&OUTPUT);
        callback::remove_callback(memlog_poll);
    }
}

pub static DRIVER: Driver<'static> = Driver::new(
    "memlog",
    PlatformMask::ALL,
    DriverClass::Critical,
    &MemlogOps,
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{arch::mock::MockCpu, dev::driver::DriverTable};
    use std::vec;

    #[test]
    fn test_drops_when_full() {
        let log = Memlog::<MockCpu, 8>::new();
        log.write_str("hello");
        log.write_char(b',');
        log.write_str(" world");
        assert_eq!(log.len(), 8);
        log.with_contents(|c| assert_eq!(c, b"hello, w"));
        log.write_char(b'!');
        log.with_contents(|c| assert_eq!(c, b"hello, w"));
    }

    #[test]
    fn test_flush_covers_written_bytes() {
        let log = Memlog::<MockCpu, 64>::new();
        log.flush();
        assert!(MockCpu::flushed_ranges().is_empty());

        log.write_str("abc");
        log.flush();
        let start = log.with_contents(|c| c.as_ptr() as usize);
        assert_eq!(MockCpu::flushed_ranges(), vec![(start, 3)]);
    }

    #[test]
    fn test_driver_lifecycle() {
        let drivers = [&DRIVER];
        let table = DriverTable::new(&drivers);
        let devices = output::OUTPUTS.len();
        let callbacks = callback::CALLBACKS.len();

        table.stage_init(PlatformMask::GAMECUBE);
        assert!(DRIVER.is_ready());
        assert_eq!(output::OUTPUTS.len(), devices + 1);
        assert_eq!(callback::CALLBACKS.len(), callbacks + 1);

        crate::kprint!("{}", "seen");
        MEMLOG.with_contents(|c| {
            assert!(c.starts_with(b"In-Memory logger is now active\r\n"));
            assert!(c.ends_with(b"seen"));
        });

        table.cleanup(&DRIVER);
        assert_eq!(DRIVER.state(), DriverState::NotReady);
        assert_eq!(output::OUTPUTS.len(), devices);
        assert_eq!(callback::CALLBACKS.len(), callbacks);
    }
}
