use std::{collections::HashMap, env, fs, path::PathBuf};

use serde::Deserialize;

/// Image layout of one architecture in `link_flags.json`.
#[derive(Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct LinkFlags {
    load_addr: String,
}

fn parse_hex(hex_str: &str) -> Result<u64, std::num::ParseIntError> {
    let clean_hex = hex_str.trim().trim_start_matches("0x").replace('_', "");
    u64::from_str_radix(clean_hex.as_str(), 16)
}

fn to_hex(value: u64) -> String {
    format!("{:#x}", value)
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=linker.cross.ld");
    println!("cargo:rerun-if-changed=link_flags.json");

    let target_arch = env::var("CARGO_CFG_TARGET_ARCH").unwrap();
    // Host builds (unit tests, docs) have nothing to link.
    if target_arch != "powerpc" {
        return;
    }
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let flags_str = fs::read_to_string(manifest_dir.join("link_flags.json")).unwrap();
    let flagmap: HashMap<String, LinkFlags> = serde_json::from_str(&flags_str).unwrap();
    let flags = match flagmap.get(target_arch.as_str()) {
        Some(value) => value,
        None => panic!("Unknown Architecture."),
    };
    let load_addr = parse_hex(&flags.load_addr).unwrap();
    make_linker(&manifest_dir, load_addr);
}

fn make_linker(manifest_dir: &PathBuf, load_addr: u64) {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let path = out_dir.join("linker.ld");
    let mut sout = fs::read_to_string(manifest_dir.join("linker.cross.ld")).unwrap();
    sout = sout.replace("%LOAD_ADDR%", to_hex(load_addr).as_str());
    fs::write(&path, sout).unwrap();
    println!("cargo:rustc-link-arg-bins=-T{}", path.display());
}
