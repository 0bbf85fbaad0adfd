// SPDX-License-Identifier: GPL-3.0-or-later

//! LD_PRELOAD shim. Intercepts the exec-family calls a build system
//! issues, records the ones recognised as compiler invocations through
//! [`cc_logger`], and always falls through to the real libc symbol.

#[cfg(target_os = "linux")]
mod hooks;

#[cfg(target_os = "linux")]
pub use hooks::*;

/// Version string embedded for diagnostics.
pub static PRELOAD_VERSION: &str = env!("CARGO_PKG_VERSION");
