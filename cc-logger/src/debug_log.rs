// SPDX-License-Identifier: GPL-3.0-or-later

//! Optional append-only diagnostic log, gated by `CC_LOGGER_DEBUG_FILE`.
//!
//! Grounded on `ldlogger-util.c::logPrint`: distinct from the internal
//! `log`/`env_logger` diagnostics this crate also emits (see
//! [`crate::config`]) — this sink is user-facing, env-var-gated, and
//! lock-protected so multiple intercepted processes can share one file.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use crate::environment::KEY_LOGGER_DEBUG_FILE;
use crate::file_lock::FileLock;

/// One placeholder value for [`write_record`]'s mini format language,
/// mirroring `logPrint`'s `%s`/`%d`/`%a` directives.
pub enum DebugArg<'a> {
    Str(&'a str),
    Int(usize),
    Args(&'a [String]),
}

/// Severity prefix, mirroring `logPrint`'s `[LEVEL timestamp]` header.
#[derive(Clone, Copy)]
pub enum Level {
    Info,
    Warning,
    Error,
}

impl Level {
    fn as_str(self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
        }
    }
}

/// Renders `format` by substituting each `%s`/`%d`/`%a` in order with the
/// matching `args` entry, then appends the result as one line to the file
/// named by `CC_LOGGER_DEBUG_FILE`, if set. A no-op (not an error) when
/// that variable is unset, matching the original's silent-disable behavior.
pub fn write_record(level: Level, site: &str, format: &str, args: &[DebugArg]) {
    let Ok(path) = std::env::var(KEY_LOGGER_DEBUG_FILE) else {
        return;
    };
    if path.is_empty() {
        return;
    }

    let rendered = render(format, args);
    let line = format!(
        "[{} {}][{site}] - {rendered}\n",
        level.as_str(),
        unix_timestamp(),
    );

    let _ = append_locked(Path::new(&path), &line);
}

fn render(format: &str, args: &[DebugArg]) -> String {
    let mut out = String::new();
    let mut arg_iter = args.iter();
    let mut chars = format.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('s') => match arg_iter.next() {
                Some(DebugArg::Str(s)) => out.push_str(s),
                Some(DebugArg::Int(n)) => out.push_str(&n.to_string()),
                Some(DebugArg::Args(a)) => out.push_str(&a.join(" ")),
                None => out.push_str("%s"),
            },
            Some('d') => match arg_iter.next() {
                Some(DebugArg::Int(n)) => out.push_str(&n.to_string()),
                Some(DebugArg::Str(s)) => out.push_str(s),
                Some(DebugArg::Args(a)) => out.push_str(&a.len().to_string()),
                None => out.push_str("%d"),
            },
            Some('a') => match arg_iter.next() {
                Some(DebugArg::Args(a)) => out.push_str(&a.join(" ")),
                Some(DebugArg::Str(s)) => out.push_str(s),
                Some(DebugArg::Int(n)) => out.push_str(&n.to_string()),
                None => out.push_str("%a"),
            },
            Some(other) => {
                out.push('%');
                out.push(other);
            }
            None => out.push('%'),
        }
    }
    out
}

fn unix_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn append_locked(path: &Path, line: &str) -> std::io::Result<()> {
    let _lock = FileLock::acquire(path).ok();
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_string_and_int_placeholders() {
        let args = [DebugArg::Str("gcc"), DebugArg::Int(3)];
        assert_eq!(render("prog=%s argc=%d", &args), "prog=gcc argc=3");
    }

    #[test]
    fn renders_array_placeholder_space_joined() {
        let values = vec!["-c".to_string(), "a.c".to_string()];
        let args = [DebugArg::Args(&values)];
        assert_eq!(render("args=%a", &args), "args=-c a.c");
    }

    #[test]
    fn disabled_without_env_var_does_not_panic() {
        unsafe { std::env::remove_var(KEY_LOGGER_DEBUG_FILE) };
        write_record(Level::Info, "test", "no-op %s", &[DebugArg::Str("x")]);
    }

    #[test]
    fn writes_a_line_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("debug.log");
        unsafe { std::env::set_var(KEY_LOGGER_DEBUG_FILE, &log_path) };
        write_record(Level::Warning, "site", "hello %s", &[DebugArg::Str("world")]);
        unsafe { std::env::remove_var(KEY_LOGGER_DEBUG_FILE) };

        let contents = std::fs::read_to_string(&log_path).unwrap();
        assert!(contents.contains("hello world"));
        assert!(contents.contains("[WARNING"));
    }
}
