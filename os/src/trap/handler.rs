//! Exception dispatch and the fatal exception report.
use core::fmt::{self, Display, Formatter};

use log::{debug, error};
use num_enum::TryFromPrimitive;
use utils::num::AlignableTo;

use crate::{
    arch::CpuOps,
    config::{BACKTRACE_MAX_DEPTH, DECREMENTER_MAX, PlatformConfig},
    trap::{intc::IntcDev, intr::IrqTable},
};

/// PowerPC exception vectors.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
pub enum ExceptionVector {
    SystemReset = 0x100,
    MachineCheck = 0x200,
    Dsi = 0x300,
    Isi = 0x400,
    External = 0x500,
    Alignment = 0x600,
    Program = 0x700,
    FpUnavailable = 0x800,
    Decrementer = 0x900,
    SystemCall = 0xc00,
    Trace = 0xd00,
    FpAssist = 0xe00,
    PerformanceMonitor = 0xf00,
    InstructionBreakpoint = 0x1300,
    SystemManagement = 0x1400,
    Thermal = 0x1700,
}

impl ExceptionVector {
    pub const fn name(self) -> &'static str {
        match self {
            ExceptionVector::SystemReset => "System Reset",
            ExceptionVector::MachineCheck => "Machine Check",
            ExceptionVector::Dsi => "DSI",
            ExceptionVector::Isi => "ISI",
            ExceptionVector::External => "External Interrupt",
            ExceptionVector::Alignment => "Alignment",
            ExceptionVector::Program => "Program",
            ExceptionVector::FpUnavailable => "FP Unavailable",
            ExceptionVector::Decrementer => "Decrementer",
            ExceptionVector::SystemCall => "System Call",
            ExceptionVector::Trace => "Trace",
            ExceptionVector::FpAssist => "FP Assist",
            ExceptionVector::PerformanceMonitor => "Performance Monitor",
            ExceptionVector::InstructionBreakpoint => "Instruction Breakpoint",
            ExceptionVector::SystemManagement => "System Management",
            ExceptionVector::Thermal => "Thermal",
        }
    }
}

pub fn describe(vector: u32) -> &'static str {
    ExceptionVector::try_from(vector).map_or("Reserved", ExceptionVector::name)
}

/// Machine state saved by the vector stub and the shared body.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SavedRegs {
    pub gpr: [u32; 32],
    pub cr: u32,
    pub xer: u32,
    pub lr: u32,
    pub ctr: u32,
    pub srr0: u32,
    pub srr1: u32,
    pub dar: u32,
    pub dsisr: u32,
}

impl SavedRegs {
    /// Stack pointer of the interrupted code.
    pub fn sp(&self) -> u32 {
        self.gpr[1]
    }
}

impl Display for SavedRegs {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("\r\n R0..R7    R8..R15  R16..R23  R24..R31\r\n")?;
        for i in 0..8 {
            let g = &self.gpr;
            write!(f, "{:08x}  {:08x}  {:08x}  {:08x}\r\n", g[i], g[i + 8], g[i + 16], g[i + 24])?;
        }
        f.write_str("\r\n CR/XER    LR/CTR  SRR0/SRR1 DAR/DSISR\r\n")?;
        write!(f, "{:08x}  {:08x}  {:08x}  {:08x}\r\n", self.cr, self.lr, self.srr0, self.dar)?;
        write!(f, "{:08x}  {:08x}  {:08x}  {:08x}\r\n", self.xer, self.ctr, self.srr1, self.dsisr)
    }
}

/// Access to the interrupted code's stack.
pub trait StackReader {
    /// The back chain and saved link register of the frame at `sp`.
    fn read_frame(&self, sp: u32) -> Option<(u32, u32)>;
}

/// Size of the back chain and saved link register at the bottom of a frame.
pub const FRAME_HEADER_SIZE: usize = 8;

/// Whether the frame header at `sp` can be read without faulting.
///
/// Needs a word aligned address inside cached RAM of the running console;
/// without a published configuration nothing is considered readable.
pub fn frame_readable(config: Option<&PlatformConfig>, sp: u32) -> bool {
    sp.is_aligned_to(4)
        && config.is_some_and(|cfg| cfg.is_cached_ram(sp as usize, FRAME_HEADER_SIZE))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub sp: u32,
    pub lr: u32,
}

/// Walks the back chain, at most [BACKTRACE_MAX_DEPTH] frames.
///
/// The walk stops after a frame whose back chain does not point strictly
/// upwards, is zero or is all ones.
pub struct Backtrace<'a> {
    stack: &'a dyn StackReader,
    sp: u32,
    depth: usize,
    done: bool,
}

impl<'a> Backtrace<'a> {
    pub fn new(stack: &'a dyn StackReader, sp: u32) -> Self {
        Backtrace {
            stack,
            sp,
            depth: 0,
            done: sp == 0,
        }
    }
}

impl Iterator for Backtrace<'_> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        if self.done || self.depth >= BACKTRACE_MAX_DEPTH {
            return None;
        }
        let Some((prev, lr)) = self.stack.read_frame(self.sp) else {
            self.done = true;
            return None;
        };
        let frame = Frame { sp: self.sp, lr };
        self.depth += 1;
        if prev <= self.sp || prev == 0 || prev == u32::MAX {
            self.done = true;
        } else {
            self.sp = prev;
        }
        Some(frame)
    }
}

/// Everything printed about an exception the runtime cannot handle.
pub struct FatalReport<'a> {
    pub vector: u32,
    pub regs: &'a SavedRegs,
    pub stack: &'a dyn StackReader,
}

impl Display for FatalReport<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "\r\nException {:04x} ({}) occurred!\r\n",
            self.vector,
            describe(self.vector)
        )?;
        write!(f, "{}", self.regs)?;
        f.write_str("Stack trace:\r\n")?;
        for (depth, frame) in Backtrace::new(self.stack, self.regs.sp()).enumerate() {
            write!(f, "  #{}  SP=0x{:08x}  LR=0x{:08x}\r\n", depth, frame.sp, frame.lr)?;
        }
        Ok(())
    }
}

/// How a recoverable exception was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    /// External interrupt; `serviced` sources had a handler.
    External { serviced: usize },
    /// Decrementer rearmed to its maximum.
    Decrementer,
}

/// Handle exception `vector`.
///
/// External interrupts are routed through `irqs`, the decrementer is pushed
/// back as far as it goes, and everything else is reported and fatal.
pub fn dispatch<C: CpuOps>(
    vector: u32,
    irqs: &IrqTable<C>,
    intc: Option<&dyn IntcDev>,
    regs: &SavedRegs,
    stack: &dyn StackReader,
) -> Handled {
    match ExceptionVector::try_from(vector) {
        Ok(ExceptionVector::External) => {
            let serviced = match intc {
                Some(intc) => irqs.route(intc),
                None => 0,
            };
            if serviced == 0 {
                debug!("external interrupt with nothing to service");
            }
            Handled::External { serviced }
        }
        Ok(ExceptionVector::Decrementer) => {
            C::set_decrementer(DECREMENTER_MAX);
            Handled::Decrementer
        }
        _ => {
            error!("{}", FatalReport { vector, regs, stack });
            panic_fatal!("exceptions", "Got fatal exception {:#06x}", vector)
        }
    }
}
