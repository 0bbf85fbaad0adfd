// SPDX-License-Identifier: GPL-3.0-or-later

//! Argument parser for `javac`-family invocations.
//!
//! Grounded on `ldlogger-tool-javac.c::loggerJavacParserCollectActions`
//! and its helpers `processArg`/`handleClassPath`/`readArgumentsFromFile`.

use std::io::BufRead;
use std::path::PathBuf;

use crate::action::Action;
use crate::config::Snapshot;
use crate::strutil::resolve_absolute;

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    Normal,
    InClassDir,
    InClassPath,
}

struct ParserData {
    has_source_path: bool,
    state: State,
    common_args: Vec<String>,
    sources: Vec<PathBuf>,
    classdir: Option<PathBuf>,
}

/// Expands a single classpath component using glob semantics (no command
/// substitution, the way `wordexp(WRDE_NOCMD|WRDE_UNDEF)` refuses to run
/// arbitrary shell constructs), falling back to the raw component
/// unresolved if expansion finds nothing or fails outright.
///
/// Mirrors `handleClassPath`.
fn handle_classpath(value: &str) -> String {
    let mut resolved = Vec::new();
    for part in value.split(':') {
        if part.is_empty() {
            continue;
        }
        match glob::glob(part) {
            Ok(paths) => {
                let mut matched = false;
                for entry in paths.flatten() {
                    if let Ok(abs) = resolve_absolute(&entry, true) {
                        resolved.push(abs.display().to_string());
                        matched = true;
                    }
                }
                if !matched {
                    resolved.push(part.to_string());
                }
            }
            Err(_) => resolved.push(part.to_string()),
        }
    }
    resolved.join(":")
}

/// Reads a `@file` response file line by line, stripping leading
/// whitespace and a leading quote, truncating at the next quote.
///
/// Mirrors `readArgumentsFromFile`.
fn read_arguments_from_file(path: &str) -> Vec<String> {
    let Ok(file) = std::fs::File::open(path) else {
        return Vec::new();
    };
    let reader = std::io::BufReader::new(file);
    let mut out = Vec::new();
    for line in reader.lines().map_while(Result::ok) {
        let trimmed = line.trim_start();
        let trimmed = trimmed.strip_prefix('"').unwrap_or(trimmed);
        let value = match trimmed.find('"') {
            Some(idx) => &trimmed[..idx],
            None => trimmed,
        };
        if !value.is_empty() {
            out.push(value.to_string());
        }
    }
    out
}

fn is_java_source(arg: &str) -> bool {
    arg.to_ascii_lowercase().ends_with(".java")
}

fn process_arg(data: &mut ParserData, arg: &str) {
    match data.state {
        State::InClassDir => {
            if let Ok(abs) = resolve_absolute(&PathBuf::from(arg), false) {
                data.classdir = Some(abs);
            } else {
                data.classdir = Some(PathBuf::from(arg));
            }
            data.state = State::Normal;
            return;
        }
        State::InClassPath => {
            let resolved = handle_classpath(arg);
            data.common_args.push(resolved);
            data.state = State::Normal;
            return;
        }
        State::Normal => {}
    }

    match arg {
        "-sourcepath" => {
            data.has_source_path = true;
            data.common_args.push(arg.to_string());
        }
        "-d" => {
            data.state = State::InClassDir;
            data.common_args.push(arg.to_string());
        }
        "-cp" | "-classpath" => {
            data.state = State::InClassPath;
            data.common_args.push(arg.to_string());
        }
        _ if is_java_source(arg) => {
            let path = resolve_absolute(&PathBuf::from(arg), false).unwrap_or_else(|_| PathBuf::from(arg));
            if !data.sources.contains(&path) {
                data.sources.push(path);
            }
            // Source arguments are not echoed into commonArgs: each
            // source gets its own Action built from commonArgs + itself.
        }
        _ => data.common_args.push(arg.to_string()),
    }
}

/// Parses a `javac` invocation into one [`Action`] per `.java` source,
/// each sharing the same non-source arguments plus its own `-sourcepath`
/// default when none was given explicitly.
pub fn collect_actions(_snapshot: &Snapshot, program: &str, args: &[String]) -> Vec<Action> {
    let mut data = ParserData {
        has_source_path: false,
        state: State::Normal,
        common_args: vec![program.to_string()],
        sources: Vec::new(),
        classdir: None,
    };

    for arg in args {
        if let Some(response_path) = arg.strip_prefix('@') {
            for expanded in read_arguments_from_file(response_path) {
                process_arg(&mut data, &expanded);
            }
        } else {
            process_arg(&mut data, arg);
        }
    }

    if !data.has_source_path {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        data.common_args.push("-sourcepath".to_string());
        data.common_args.push(cwd.display().to_string());
    }

    data.sources
        .into_iter()
        .map(|source| {
            let mut action = Action::new();
            action.arguments = data.common_args.clone();
            action.arguments.push(source.display().to_string());
            action.sources.push_unique(source.clone());
            action.output = match &data.classdir {
                Some(dir) => dir.join(class_file_name(&source)),
                None => source.with_extension("class"),
            };
            action
        })
        .collect()
}

fn class_file_name(source: &std::path::Path) -> PathBuf {
    let stem = source.file_stem().unwrap_or_default();
    let mut name = PathBuf::from(stem);
    name.set_extension("class");
    name
}
