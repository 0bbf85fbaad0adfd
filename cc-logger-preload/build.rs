// SPDX-License-Identifier: GPL-3.0-or-later

fn main() {
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("linux") {
        println!("cargo:rustc-cfg=build_cdylib");
        println!("cargo:rustc-link-arg=-Wl,--export-dynamic");
        println!("cargo:rustc-link-arg=-Wl,-rpath,$ORIGIN");
        platform_checks::perform_system_checks();
    }
}
