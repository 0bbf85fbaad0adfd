// SPDX-License-Identifier: GPL-3.0-or-later

//! Names of the environment variables this crate reads or mutates.
//!
//! Centralising the names here keeps every variable this system depends
//! on in one place instead of scattered string literals.

/// Path of the compilation database to append into. Unset disables the
/// emitter entirely (the original call still proceeds).
pub const KEY_LOGGER_FILE: &str = "CC_LOGGER_FILE";

/// Colon-separated list of matchers selecting GCC-family compilers.
pub const KEY_LOGGER_GCC_LIKE: &str = "CC_LOGGER_GCC_LIKE";

/// Colon-separated list of matchers selecting Java compilers.
pub const KEY_LOGGER_JAVAC_LIKE: &str = "CC_LOGGER_JAVAC_LIKE";

/// When set, implicit include directories are queried from the compiler.
pub const KEY_LOGGER_DEF_DIRS: &str = "CC_LOGGER_DEF_DIRS";

/// When set, source-file arguments are rewritten to absolute paths.
pub const KEY_LOGGER_ABS_PATH: &str = "CC_LOGGER_ABS_PATH";

/// When equal to the literal `true`, object/library inputs are kept as sources.
pub const KEY_LOGGER_KEEP_LINK: &str = "CC_LOGGER_KEEP_LINK";

/// Path for the optional debug log; unset disables it.
pub const KEY_LOGGER_DEBUG_FILE: &str = "CC_LOGGER_DEBUG_FILE";

// https://gcc.gnu.org/onlinedocs/cpp/Environment-Variables.html
pub const KEY_GCC_C_INCLUDE: &str = "CPATH";
pub const KEY_GCC_C_ONLY_INCLUDE: &str = "C_INCLUDE_PATH";
pub const KEY_GCC_CXX_ONLY_INCLUDE: &str = "CPLUS_INCLUDE_PATH";

pub const KEY_OS_PATH: &str = "PATH";
pub const KEY_OS_PRELOAD: &str = "LD_PRELOAD";

/// The name `LD_PRELOAD` is renamed to while the logger spawns a child of
/// its own, so that child is not re-intercepted. See [`crate::config::PreloadGuard`].
pub const KEY_OS_PRELOAD_DISABLED: &str = "XD_PRELOAD";
