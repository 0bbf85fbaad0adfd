// SPDX-License-Identifier: GPL-3.0-or-later

//! Core library for turning an intercepted compiler invocation into an
//! entry in a JSON compilation database.
//!
//! `cc-logger-preload` is the thin LD_PRELOAD shim; everything that
//! decides what an invocation means and how it gets written down lives
//! here so it can be unit tested without loading a shared object into a
//! process's address space.

pub mod action;
pub mod config;
pub mod database;
pub mod debug_log;
pub mod environment;
pub mod error;
pub mod file_lock;
pub mod semantic;
pub mod strutil;

use std::path::Path;

use crate::config::Snapshot;
use crate::debug_log::{DebugArg, Level};
use crate::environment::KEY_LOGGER_FILE;
use crate::error::LoggerError;

/// Top-level entry point called from every intercepted exec-family hook.
///
/// Mirrors `logExec`: looks up the destination database path, classifies
/// and parses the invocation, and appends the result under lock. Returns
/// `Ok(())` both when an entry was written and when the invocation was
/// recognised but produced nothing to log (e.g. `gcc --version`) — only
/// genuine failures to acquire configuration or resources are errors, and
/// even those are meant to be logged and swallowed by the caller so a
/// malformed or unwritable database never blocks the underlying build.
pub fn record_execution(program: &str, args: &[String]) -> Result<(), LoggerError> {
    let snapshot = Snapshot::capture()?;

    config::disable_preload_for_ldd(program);

    let Some(db_path) = snapshot.get(KEY_LOGGER_FILE) else {
        return Err(LoggerError::Configuration(KEY_LOGGER_FILE));
    };

    debug_log::write_record(
        Level::Info,
        "record_execution",
        "intercepted %s %a",
        &[DebugArg::Str(program), DebugArg::Args(args)],
    );

    let Some(actions) = semantic::collect_actions(&snapshot, program, args) else {
        return Ok(());
    };
    if actions.is_empty() {
        return Ok(());
    }

    database::append(Path::new(db_path), &snapshot.working_dir, &actions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_database_path_is_a_configuration_error() {
        unsafe { std::env::remove_var(KEY_LOGGER_FILE) };
        let err = record_execution("gcc", &["-c".to_string(), "a.c".to_string()]).unwrap_err();
        assert!(matches!(err, LoggerError::Configuration(_)));
    }

    #[test]
    fn unrecognised_program_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("compile_commands.json");
        unsafe { std::env::set_var(KEY_LOGGER_FILE, &db) };
        let result = record_execution("ls", &["-la".to_string()]);
        unsafe { std::env::remove_var(KEY_LOGGER_FILE) };
        assert!(result.is_ok());
        assert!(!db.exists());
    }

    #[test]
    fn recognised_gcc_invocation_writes_an_entry() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("compile_commands.json");
        unsafe {
            std::env::set_var(KEY_LOGGER_FILE, &db);
            std::env::set_var(environment::KEY_LOGGER_GCC_LIKE, "gcc");
        }
        let result = record_execution("gcc", &["-c".to_string(), "a.c".to_string()]);
        unsafe {
            std::env::remove_var(KEY_LOGGER_FILE);
            std::env::remove_var(environment::KEY_LOGGER_GCC_LIKE);
        }
        assert!(result.is_ok());
        assert!(db.exists());
    }
}
