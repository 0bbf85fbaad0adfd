// SPDX-License-Identifier: GPL-3.0-or-later

//! Appends [`Action`]s to a JSON compilation database, under an advisory
//! lock, without ever reading or re-serialising the existing contents.
//!
//! Grounded on `ldlogger-logger.c::writeActions`/`writeAction`/`logExec`:
//! the file is opened read-write, the lock is taken, and the write seeks
//! to just before the trailing `]` and overwrites it with the new
//! entries followed by a fresh `]`. A brand-new (empty) file instead gets
//! the opening `[`.

use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::action::Action;
use crate::error::LoggerError;
use crate::file_lock::FileLock;
use crate::strutil::{json_escape_only, shell_json_escape};

/// One compilation database record.
struct Entry<'a> {
    directory: &'a Path,
    command: String,
    file: &'a Path,
}

impl<'a> Entry<'a> {
    fn render(&self, first: bool) -> String {
        let mut out = String::new();
        if !first {
            out.push_str("\t,\n");
        }
        out.push_str("\t{\n");
        out.push_str(&format!(
            "\t\t\"directory\": \"{}\",\n",
            json_escape_only(self.directory.as_os_str().as_encoded_bytes())
        ));
        out.push_str(&format!("\t\t\"command\": \"{}\",\n", self.command));
        out.push_str(&format!(
            "\t\t\"file\": \"{}\"\n",
            json_escape_only(self.file.as_os_str().as_encoded_bytes())
        ));
        out.push_str("\t}\n");
        out
    }
}

/// Builds the shell-quoted, JSON-escaped `command` string for one action:
/// every argument escaped individually, joined by single spaces.
///
/// Grounded on `ldlogger-logger.c::createJsonCommandString`.
fn render_command(arguments: &[String]) -> String {
    let mut out = String::new();
    for (i, arg) in arguments.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&shell_json_escape(arg.as_bytes()));
    }
    out
}

/// Appends one entry per source file across all `actions` into the
/// database at `db_path`, creating it if necessary, under an exclusive
/// lock held for the whole read-modify-write.
pub fn append(db_path: &Path, working_dir: &Path, actions: &[Action]) -> Result<(), LoggerError> {
    let _lock = FileLock::acquire(db_path)?;

    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(db_path)
        .map_err(|e| {
            LoggerError::ResourceAcquisition(format!(
                "cannot open database {}: {e}",
                db_path.display()
            ))
        })?;

    let size = file.metadata()?.len();

    // Detect whether the file already holds a non-empty array so we know
    // whether a leading comma is needed before the first new entry, and
    // whether we must seek back over the existing trailing `]`.
    let mut entry_count_seed = 0usize;
    if size == 0 {
        file.write_all(b"[\n")?;
    } else {
        if size > 5 {
            entry_count_seed = 1;
        }
        file.seek(SeekFrom::End(-1))?;
        let mut tail = [0u8; 1];
        file.read_exact(&mut tail)?;
        debug_assert_eq!(&tail, b"]");
        file.seek(SeekFrom::End(-1))?;
    }

    let mut entry_count = entry_count_seed;
    for action in actions {
        let command = render_command(&action.arguments);
        for source in action.sources.iter() {
            let entry = Entry {
                directory: working_dir,
                command: command.clone(),
                file: source,
            };
            file.write_all(entry.render(entry_count == 0).as_bytes())?;
            entry_count += 1;
        }
    }

    file.write_all(b"]")?;
    file.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::SourceSet;
    use assert_fs::prelude::*;
    use predicates::prelude::*;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::thread;

    fn sample_action(source: &str, args: &[&str]) -> Action {
        let mut sources = SourceSet::new();
        sources.push_unique(PathBuf::from(source));
        Action {
            output: PathBuf::from("./_noobj"),
            arguments: args.iter().map(|s| s.to_string()).collect(),
            sources,
        }
    }

    fn parse(text: &str) -> serde_json::Value {
        serde_json::from_str(text).expect("valid json")
    }

    #[test]
    fn creates_new_database_with_single_entry() {
        let dir = assert_fs::TempDir::new().unwrap();
        let db = dir.child("compile_commands.json");
        let action = sample_action("a.c", &["gcc", "-c", "a.c"]);
        append(db.path(), dir.path(), &[action]).unwrap();

        db.assert(predicate::path::exists());
        db.assert(predicate::str::contains("\"file\": \"a.c\""));

        let text = std::fs::read_to_string(db.path()).unwrap();
        let value = parse(&text);
        let array = value.as_array().unwrap();
        assert_eq!(array.len(), 1);
        assert_eq!(array[0]["file"], "a.c");
    }

    #[test]
    fn directory_and_file_with_spaces_are_not_shell_escaped() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("compile_commands.json");
        let nested = dir.path().join("has a space");
        std::fs::create_dir(&nested).unwrap();
        let action = sample_action("has a space/foo.cpp", &["g++", "-c", "has a space/foo.cpp"]);
        append(&db, &nested, &[action]).unwrap();

        let text = std::fs::read_to_string(&db).unwrap();
        let value = parse(&text);
        assert_eq!(value[0]["file"], "has a space/foo.cpp");
        assert_eq!(value[0]["directory"], nested.to_string_lossy().into_owned());
    }

    #[test]
    fn appends_to_existing_database() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("compile_commands.json");
        append(&db, dir.path(), &[sample_action("a.c", &["gcc", "-c", "a.c"])]).unwrap();
        append(&db, dir.path(), &[sample_action("b.c", &["gcc", "-c", "b.c"])]).unwrap();

        let text = std::fs::read_to_string(&db).unwrap();
        let value = parse(&text);
        let array = value.as_array().unwrap();
        assert_eq!(array.len(), 2);
        assert_eq!(array[0]["file"], "a.c");
        assert_eq!(array[1]["file"], "b.c");
    }

    #[test]
    fn one_action_with_multiple_sources_emits_multiple_entries() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("compile_commands.json");
        let mut sources = SourceSet::new();
        sources.push_unique(PathBuf::from("a.c"));
        sources.push_unique(PathBuf::from("b.c"));
        let action = Action {
            output: PathBuf::from("./_noobj"),
            arguments: vec!["gcc".into(), "-c".into(), "a.c".into(), "b.c".into()],
            sources,
        };
        append(&db, dir.path(), &[action]).unwrap();

        let text = std::fs::read_to_string(&db).unwrap();
        let value = parse(&text);
        assert_eq!(value.as_array().unwrap().len(), 2);
    }

    #[test]
    fn concurrent_appends_from_multiple_threads_preserve_all_entries() {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(dir.path().join("compile_commands.json"));
        let working_dir = Arc::new(dir.path().to_path_buf());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let db = db.clone();
                let working_dir = working_dir.clone();
                thread::spawn(move || {
                    let file_name = format!("f{i}.c");
                    let action = sample_action(&file_name, &["gcc", "-c", &file_name]);
                    append(&db, &working_dir, &[action]).unwrap();
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        let text = std::fs::read_to_string(db.as_path()).unwrap();
        let value = parse(&text);
        assert_eq!(value.as_array().unwrap().len(), 8);
    }
}
