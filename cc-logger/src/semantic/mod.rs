// SPDX-License-Identifier: GPL-3.0-or-later

//! Compiler recognition and argument interpretation.

pub mod classifier;
mod gcc;
mod javac;

pub use classifier::{classify, collect_actions, matches_program_list, CompilerKind};
