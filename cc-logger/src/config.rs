// SPDX-License-Identifier: GPL-3.0-or-later

//! Ambient configuration: a one-shot capture of the environment a hook
//! fires in, and the `LD_PRELOAD` suppression guard used while this
//! library spawns children of its own.
//!
//! Grounded on `bear/src/context.rs::Context::capture` for the snapshot
//! shape, and on `ldlogger-tool.c::turnLogging`/`unsetLDPRELOAD` for the
//! suppression mechanism.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::environment::{KEY_OS_PATH, KEY_OS_PRELOAD, KEY_OS_PRELOAD_DISABLED};
use crate::error::LoggerError;

/// Everything a hook needs to know about the process it fired in, read
/// once up front so the rest of the pipeline doesn't repeatedly touch
/// global process state.
pub struct Snapshot {
    pub working_dir: PathBuf,
    pub environment: HashMap<String, String>,
}

impl Snapshot {
    pub fn capture() -> Result<Self, LoggerError> {
        let working_dir = std::env::current_dir()?;
        let environment = std::env::vars().collect();
        Ok(Self {
            working_dir,
            environment,
        })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.environment.get(key).map(String::as_str)
    }

    pub fn path_entries(&self) -> Vec<&str> {
        self.get(KEY_OS_PATH)
            .map(|p| p.split(':').collect())
            .unwrap_or_default()
    }
}

/// Disables recursive interception for the scope of this guard by
/// renaming `LD_PRELOAD` to `XD_PRELOAD` in the process environment, and
/// restores it on drop.
///
/// This mirrors `turnLogging`'s first-byte flip exactly in effect (the
/// dynamic linker no longer recognises the variable, so children spawned
/// while the guard is held are not re-intercepted) but is expressed as an
/// RAII guard over the two named variables rather than scanning and
/// mutating `environ` in place, since Rust has no supported safe way to
/// poke a single byte inside the process's raw environment block.
pub struct PreloadGuard {
    saved: Option<String>,
}

impl PreloadGuard {
    pub fn engage() -> Self {
        let saved = std::env::var(KEY_OS_PRELOAD).ok();
        if let Some(ref value) = saved {
            unsafe {
                std::env::set_var(KEY_OS_PRELOAD_DISABLED, value);
                std::env::remove_var(KEY_OS_PRELOAD);
            }
        }
        Self { saved }
    }
}

impl Drop for PreloadGuard {
    fn drop(&mut self) {
        if let Some(ref value) = self.saved {
            unsafe {
                std::env::set_var(KEY_OS_PRELOAD, value);
                std::env::remove_var(KEY_OS_PRELOAD_DISABLED);
            }
        }
    }
}

/// Mirrors `unsetLDPRELOAD`: when the program about to run is `ldd` (or a
/// path ending in `/ldd`), `LD_PRELOAD` is unset outright rather than
/// scoped, because `ldd` itself works by preloading a probe library and
/// our hook would otherwise intercept and corrupt that mechanism.
///
/// Kept as a permanent unset (not a guard) because the original is too:
/// `ldd` never expects the variable back, and it invokes the dynamic
/// linker directly rather than continuing as a host process we'd need to
/// restore state for.
pub fn disable_preload_for_ldd(program: &str) {
    let basename = program.rsplit('/').next().unwrap_or(program);
    let is_ldd = basename == "ldd" || program.ends_with("/ldd");
    if is_ldd {
        unsafe {
            std::env::remove_var(KEY_OS_PRELOAD);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test_helper::serial;

    mod serial_test_helper {
        use std::sync::Mutex;
        pub static LOCK: Mutex<()> = Mutex::new(());

        pub fn serial() -> std::sync::MutexGuard<'static, ()> {
            LOCK.lock().unwrap_or_else(|e| e.into_inner())
        }
    }

    #[test]
    fn preload_guard_restores_on_drop() {
        let _guard = serial();
        unsafe { std::env::set_var(KEY_OS_PRELOAD, "/path/to/lib.so") };
        {
            let _g = PreloadGuard::engage();
            assert!(std::env::var(KEY_OS_PRELOAD).is_err());
            assert_eq!(std::env::var(KEY_OS_PRELOAD_DISABLED).unwrap(), "/path/to/lib.so");
        }
        assert_eq!(std::env::var(KEY_OS_PRELOAD).unwrap(), "/path/to/lib.so");
        assert!(std::env::var(KEY_OS_PRELOAD_DISABLED).is_err());
        unsafe { std::env::remove_var(KEY_OS_PRELOAD) };
    }

    #[test]
    fn disable_preload_for_ldd_matches_basename() {
        let _guard = serial();
        unsafe { std::env::set_var(KEY_OS_PRELOAD, "/path/to/lib.so") };
        disable_preload_for_ldd("/usr/bin/ldd");
        assert!(std::env::var(KEY_OS_PRELOAD).is_err());
    }

    #[test]
    fn disable_preload_for_ldd_ignores_other_programs() {
        let _guard = serial();
        unsafe { std::env::set_var(KEY_OS_PRELOAD, "/path/to/lib.so") };
        disable_preload_for_ldd("/usr/bin/gcc");
        assert_eq!(std::env::var(KEY_OS_PRELOAD).unwrap(), "/path/to/lib.so");
        unsafe { std::env::remove_var(KEY_OS_PRELOAD) };
    }
}
