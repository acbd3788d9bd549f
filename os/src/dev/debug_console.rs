//! Output device over the platform's debug transport.
use crate::{
    dev::output::{self, OutputDevice},
    platform::{self, PlatformOps},
};

/// Prefer the string hook, fall back to one character at a time, else drop.
fn forward_str(ops: Option<PlatformOps>, s: &str) {
    let Some(ops) = ops else {
        return;
    };
    if let Some(write_str) = ops.debug_write_str {
        write_str(s);
    } else if let Some(write_char) = ops.debug_write_char {
        s.bytes().for_each(write_char);
    }
}

fn debug_write_char(c: u8) {
    if let Some(write_char) = platform::ops().and_then(|ops| ops.debug_write_char) {
        write_char(c);
    }
}

fn debug_write_str(s: &str) {
    forward_str(platform::ops(), s);
}

static OUTPUT: OutputDevice = OutputDevice {
    name: Some("Platform debug console"),
    is_graphical: false,
    rows: 25,
    columns: 80,
    driver: None,
    write_char: debug_write_char,
    write_str: debug_write_str,
};

/// Route console output to the platform's debug transport.
pub fn init() {
    output::add_device(&OUTPUT);
    debug_write_str("Platform debug console initialized\r\n");
}

pub fn cleanup() {
    output::remove_device(&OUTPUT);
}
