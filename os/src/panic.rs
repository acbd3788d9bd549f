//! The fatal path.
//!
//! Report, give a display a chance to show the report, then hand the machine
//! to the platform's terminal action. Nothing here returns.
use core::{
    fmt::Arguments,
    marker::PhantomData,
    panic::PanicInfo,
    sync::atomic::{AtomicBool, Ordering},
};

use spin::Mutex;

use crate::{
    arch::{Cpu, CpuOps},
    dev::output::{OUTPUTS, OutputTable},
    platform::{PLATFORM, PlatformSlot},
    sync::disable_and_save,
};

/// State of the fatal path: whether it has been entered, and the display
/// flush hook.
pub struct FatalPath<C: CpuOps = Cpu> {
    panicking: AtomicBool,
    flush: Mutex<Option<fn()>>,
    _cpu: PhantomData<fn() -> C>,
}

impl<C: CpuOps> FatalPath<C> {
    pub const fn new() -> Self {
        FatalPath {
            panicking: AtomicBool::new(false),
            flush: Mutex::new(None),
            _cpu: PhantomData,
        }
    }

    pub fn set_display_flush(&self, flush: Option<fn()>) {
        *self.flush.lock() = flush;
    }

    /// Print `msg` to `outputs`, flush the display, then run the terminal
    /// action of `platform`. Halts when no ops are installed.
    ///
    /// A second entry halts at once: the output path and the ops are suspect.
    pub fn run(&self, outputs: &OutputTable<C>, platform: &PlatformSlot<C>, msg: Arguments) -> ! {
        disable_and_save::<C>();
        if self.panicking.swap(true, Ordering::SeqCst) {
            C::halt();
        }

        outputs.print(format_args!("FATAL: PANIC: {}\r\n", msg));
        // The hook may be mid-update if the panic came from set_display_flush.
        if let Some(flush) = self.flush.try_lock().and_then(|hook| *hook) {
            flush();
        }
        if let Some(ops) = platform.ops() {
            (ops.panic)(msg);
        }
        C::halt()
    }
}

impl<C: CpuOps> Default for FatalPath<C> {
    fn default() -> Self {
        Self::new()
    }
}

static FATAL: FatalPath = FatalPath::new();

/// Register the hook that pushes pending output to the active display.
/// Passing `None` unregisters it.
pub fn set_display_flush(flush: Option<fn()>) {
    FATAL.set_display_flush(flush);
}

/// Report `msg` on every output device and stop the machine.
pub fn fatal(msg: Arguments) -> ! {
    FATAL.run(&OUTPUTS, &PLATFORM, msg)
}

/// Entry point for the image's `#[panic_handler]`.
pub fn on_panic(info: &PanicInfo) -> ! {
    fatal(format_args!("{}", info))
}

#[macro_export]
/// Panic on a condition the runtime cannot recover from, naming the subsystem.
macro_rules! panic_fatal {
    ($subsys: literal, $fmt: literal $(, $($arg: tt)+)?) => {
        panic!(concat!($subsys, ": ", $fmt) $(, $($arg)+)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        arch::mock::MockCpu,
        dev::output::OutputDevice,
        platform::PlatformOps,
    };
    use core::cell::RefCell;
    use std::{
        panic::{AssertUnwindSafe, catch_unwind},
        string::{String, ToString},
        vec::Vec,
    };

    std::thread_local! {
        static SINK: RefCell<String> = const { RefCell::new(String::new()) };
        static EVENTS: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
    }

    fn sink_str(s: &str) {
        SINK.with(|b| b.borrow_mut().push_str(s));
    }
    fn sink_char(c: u8) {
        SINK.with(|b| b.borrow_mut().push(c as char));
    }

    static SCREEN: OutputDevice = OutputDevice {
        name: Some("screen"),
        is_graphical: true,
        rows: 25,
        columns: 80,
        driver: None,
        write_char: sink_char,
        write_str: sink_str,
    };

    fn record(event: String) {
        EVENTS.with(|e| e.borrow_mut().push(event));
    }

    fn flush() {
        record("flush".to_string());
    }

    fn terminal(msg: Arguments<'_>) -> ! {
        let irqs = if MockCpu::interrupts_enabled() { "on" } else { "off" };
        record(std::format!("panic({}) irqs {}", msg, irqs));
        panic!("terminal action");
    }

    fn panic_message(payload: std::boxed::Box<dyn std::any::Any + Send>) -> String {
        payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_default()
    }

    fn setup() -> (FatalPath<MockCpu>, OutputTable<MockCpu>, PlatformSlot<MockCpu>) {
        SINK.with(|b| b.borrow_mut().clear());
        EVENTS.with(|e| e.borrow_mut().clear());
        let outputs = OutputTable::new();
        outputs.add(&SCREEN);
        let platform = PlatformSlot::new();
        platform.install(PlatformOps {
            panic: terminal,
            debug_write_char: None,
            debug_write_str: None,
        });
        (FatalPath::new(), outputs, platform)
    }

    #[test]
    fn test_report_flush_then_terminal_action() {
        let (fatal, outputs, platform) = setup();
        fatal.set_display_flush(Some(flush));
        MockCpu::enable_interrupts();

        let result: std::thread::Result<()> = catch_unwind(AssertUnwindSafe(|| {
            fatal.run(&outputs, &platform, format_args!("bad pool {}", 2))
        }));
        let err = result.unwrap_err();

        assert_eq!(panic_message(err), "terminal action");
        assert_eq!(SINK.with(|b| b.borrow().clone()), "FATAL: PANIC: bad pool 2\r\n");
        assert_eq!(
            EVENTS.with(|e| e.borrow().clone()),
            ["flush", "panic(bad pool 2) irqs off"]
        );
    }

    #[test]
    fn test_second_entry_halts_without_ops() {
        let (fatal, outputs, platform) = setup();
        let first: std::thread::Result<()> = catch_unwind(AssertUnwindSafe(|| {
            fatal.run(&outputs, &platform, format_args!("first"))
        }));
        assert!(first.is_err());
        EVENTS.with(|e| e.borrow_mut().clear());
        SINK.with(|b| b.borrow_mut().clear());

        let result: std::thread::Result<()> = catch_unwind(AssertUnwindSafe(|| {
            fatal.run(&outputs, &platform, format_args!("second"))
        }));
        let err = result.unwrap_err();

        assert_eq!(panic_message(err), "cpu halted");
        assert!(EVENTS.with(|e| e.borrow().is_empty()));
        assert_eq!(SINK.with(|b| b.borrow().clone()), "");
    }

    #[test]
    fn test_halts_without_ops() {
        let (fatal, outputs, _) = setup();
        let result: std::thread::Result<()> = catch_unwind(AssertUnwindSafe(|| {
            fatal.run(&outputs, &PlatformSlot::new(), format_args!("early"))
        }));
        let err = result.unwrap_err();

        assert_eq!(panic_message(err), "cpu halted");
        assert_eq!(SINK.with(|b| b.borrow().clone()), "FATAL: PANIC: early\r\n");
    }

    #[test]
    #[should_panic(expected = "mm: corrupted pool 3")]
    fn test_panic_fatal_prefix() {
        panic_fatal!("mm", "corrupted pool {}", 3);
    }
}
