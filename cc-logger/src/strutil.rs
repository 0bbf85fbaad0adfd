// SPDX-License-Identifier: GPL-3.0-or-later

//! Path resolution and the combined shell+JSON escape.
//!
//! Grounded on `ldlogger-util.c`: `loggerMakePathAbs`/`makePathAbsRec` for
//! absolute-path resolution, `shellEscapeStr`/`predictEscapedSize` for the
//! byte-level escape table.

use std::path::{Path, PathBuf};

use crate::error::LoggerError;

/// Resolves `path` to an absolute path, tolerating components that don't
/// exist yet.
///
/// Mirrors `loggerMakePathAbs`: an existing prefix is canonicalised with
/// the platform real-path primitive; a non-existent trailing segment is
/// preserved by recursing on the parent and re-appending the child. This
/// is why `Path::canonicalize` alone cannot replace this function — it
/// fails outright the moment any component is missing.
pub fn resolve_absolute(path: &Path, must_exist: bool) -> Result<PathBuf, LoggerError> {
    if path.as_os_str().is_empty() {
        return Err(LoggerError::ResourceAcquisition(
            "empty path cannot be resolved".into(),
        ));
    }

    if must_exist && !path.exists() {
        return Err(LoggerError::ResourceAcquisition(format!(
            "path does not exist: {}",
            path.display()
        )));
    }

    if path.is_absolute() {
        resolve_absolute_rec(path)
    } else {
        let cwd = std::env::current_dir()?;
        resolve_absolute_rec(&cwd.join(path))
    }
}

fn resolve_absolute_rec(path: &Path) -> Result<PathBuf, LoggerError> {
    if let Ok(canon) = path.canonicalize() {
        return Ok(canon);
    }

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => {
            return Err(LoggerError::ResourceAcquisition(format!(
                "cannot resolve path beyond root: {}",
                path.display()
            )));
        }
    };

    let child = match path.file_name() {
        Some(name) => name,
        None => {
            return Err(LoggerError::ResourceAcquisition(format!(
                "path has no final component: {}",
                path.display()
            )));
        }
    };

    if child == "." || child == ".." {
        return Err(LoggerError::ResourceAcquisition(format!(
            "cannot resolve relative marker component: {}",
            path.display()
        )));
    }

    let resolved_parent = resolve_absolute_rec(parent)?;
    Ok(resolved_parent.join(child))
}

/// Computes the exact length `shell_json_escape` would produce, including
/// the trailing NUL the original C API allocated for (kept here purely to
/// document the correspondence; Rust's `String` doesn't need a NUL, so the
/// returned size is one larger than `shell_json_escape(s).len()`).
pub fn predict_escaped_len(bytes: &[u8]) -> usize {
    let mut size = 1; // trailing NUL in the original
    for &b in bytes {
        size += escaped_width(b);
    }
    size
}

fn escaped_width(b: u8) -> usize {
    match b {
        0x07 /* \a */ | 0x1B /* \e */ | b'\t' | 0x08 /* \b */ | 0x0C /* \f */ | b'\r'
        | 0x0B /* \v */ | b'\n' | b' ' => 3,
        b'"' | b'\\' => 4,
        b if b < 0x20 => 5,
        _ => 1,
    }
}

/// Applies a combined shell-word + JSON-string escape: a byte is first
/// shell-escaped (because the `command` field is meant to be re-parsed as
/// a shell command line) and the backslashes that introduces are then
/// JSON-escaped (because the whole thing lives inside a JSON string).
pub fn shell_json_escape(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(predict_escaped_len(bytes));
    for &b in bytes {
        match b {
            0x07 => out.push_str("\\\\a"),
            0x1B => out.push_str("\\\\e"),
            b'\t' => out.push_str("\\\\t"),
            0x08 => out.push_str("\\\\b"),
            0x0C => out.push_str("\\\\f"),
            b'\r' => out.push_str("\\\\r"),
            0x0B => out.push_str("\\\\v"),
            b'\n' => out.push_str("\\\\n"),
            b' ' => out.push_str("\\\\ "),
            b'\\' => out.push_str("\\\\\\\\"),
            b'"' => out.push_str("\\\\\\\""),
            b if b < 0x20 => out.push_str(&format!("\\\\x{b:02X}")),
            b => out.push(b as char),
        }
    }
    out
}

/// Plain JSON-string escaping, with none of `shell_json_escape`'s
/// shell-word quoting: used for the `directory`/`file` fields, which are
/// read back as plain paths rather than re-parsed as a command line.
pub fn json_escape_only(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        match b {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            b if b < 0x20 => out.push_str(&format!("\\u{b:04x}")),
            b => out.push(b as char),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_space_with_three_bytes() {
        assert_eq!(shell_json_escape(b"a b"), "a\\\\ b");
        assert_eq!(predict_escaped_len(b"a b"), 1 + 1 + 3 + 1);
    }

    #[test]
    fn escapes_quote_and_backslash_with_four_bytes() {
        assert_eq!(shell_json_escape(b"\""), "\\\\\\\"");
        assert_eq!(shell_json_escape(b"\\"), "\\\\\\\\");
    }

    #[test]
    fn escapes_control_bytes_as_hex() {
        assert_eq!(shell_json_escape(&[0x01]), "\\\\x01");
        assert_eq!(shell_json_escape(&[0x1F]), "\\\\x1F");
    }

    #[test]
    fn leaves_plain_bytes_untouched() {
        assert_eq!(shell_json_escape(b"gcc-o"), "gcc-o");
    }

    #[test]
    fn resolves_relative_path_against_cwd() {
        let cwd = std::env::current_dir().unwrap();
        let resolved = resolve_absolute(Path::new("Cargo.toml"), false).unwrap();
        assert_eq!(resolved, cwd.join("Cargo.toml"));
    }

    #[test]
    fn preserves_nonexistent_trailing_component() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("does-not-exist.o");
        let resolved = resolve_absolute(&target, false).unwrap();
        assert_eq!(resolved, dir.path().canonicalize().unwrap().join("does-not-exist.o"));
    }

    #[test]
    fn must_exist_fails_for_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("missing.c");
        assert!(resolve_absolute(&target, true).is_err());
    }

    #[test]
    fn empty_path_fails() {
        assert!(resolve_absolute(Path::new(""), false).is_err());
    }

    #[test]
    fn json_escape_only_leaves_spaces_untouched() {
        assert_eq!(json_escape_only(b"my proj/foo.c"), "my proj/foo.c");
        assert_eq!(json_escape_only(b"a\"b\\c"), "a\\\"b\\\\c");
    }
}
