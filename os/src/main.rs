//! npll firmware image
//!
//! Boot steps:
//! 1. [_start]: point r1 at the boot stack.
//! 2. [boot_main]: clear the bss, identify the console and hand everything
//!    it learned to [npll::boot::init_common].
//! 3. [npll::boot::main_loop], forever.
#![no_std]
#![no_main]
#![cfg_attr(target_arch = "powerpc", feature(asm_experimental_arch))]

use core::{arch::naked_asm, fmt::Arguments, panic::PanicInfo, ptr::write_volatile};

use npll::{
    arch::{Cpu, CpuOps},
    boot,
    config::PlatformConfig,
    dev::{Driver, DriverTable, memlog, mmio::Register},
    mm::GlobalPools,
    platform::{Platform, PlatformOps},
    trap::intc::PlatformPic,
};
use spin::Once;
use utils::define_aligned;

const BOOT_STACK_SIZE: usize = 0x1_0000;

define_aligned!(BootStack, [u8; BOOT_STACK_SIZE], 32);

#[used]
#[unsafe(link_section = ".bss.stack")]
static BOOT_STACK: BootStack = BootStack([0; BOOT_STACK_SIZE]);

const HW_VERSION: usize = 0xcd80_0214;
const LT_CHIPREVID: usize = 0xcd80_05a0;

unsafe extern "C" {
    static __image_start: u8;
    static __kbss: u8;
    static __ebss: u8;
}

#[global_allocator]
static ALLOCATOR: GlobalPools = GlobalPools;

static DRIVERS: [&Driver<'static>; 1] = [&memlog::DRIVER];

static PIC: Once<PlatformPic> = Once::new();

/// The entry point of the image.
///
/// Set up the boot stack with a terminated back chain, and jump to [boot_main].
#[unsafe(no_mangle)]
#[unsafe(naked)]
#[unsafe(link_section = ".text.start")]
unsafe extern "C" fn _start() -> ! {
    naked_asm!(
        "   lis     1, __stack_top@ha
            addi    1, 1, __stack_top@l
            li      0, 0
            stwu    0, -16(1)           // back chain = 0
            b       {main}",
        main = sym boot_main,
    )
}

fn clear_bss() {
    unsafe {
        let mut p = &raw const __kbss as *mut u8;
        let e = &raw const __ebss as *mut u8;
        while p < e {
            write_volatile(p, 0);
            p = p.add(1);
        }
    }
}

fn detect_platform() -> Platform {
    // Both are plain status registers; on a GameCube they read as junk.
    let hw_version = unsafe { Register::<u32>::at(HW_VERSION) }.read();
    Platform::detect(hw_version, || unsafe { Register::<u32>::at(LT_CHIPREVID) }.read())
}

fn halt_on_panic(_msg: Arguments<'_>) -> ! {
    Cpu::halt()
}

extern "C" fn boot_main() -> ! {
    clear_bss();

    let platform = detect_platform();
    // The image sits at the top of MEM1.
    let mem1_top = &raw const __image_start as usize;
    let config = PlatformConfig::standard(platform, mem1_top);
    let ops = PlatformOps {
        panic: halt_on_panic,
        debug_write_char: None,
        debug_write_str: None,
    };
    let pic = PIC.call_once(|| PlatformPic::new(platform));

    boot::init_common(config, ops, DriverTable::new(&DRIVERS), pic);
    boot::main_loop(|| {})
}

#[panic_handler]
fn panic_handler(info: &PanicInfo) -> ! {
    npll::panic::on_panic(info)
}
