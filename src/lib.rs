//! Transpiler from DreamBerd source to TypeScript that drives a runtime scope.
//!
//! A source file is split into units at `===== name =====` headers. Each unit is lexed,
//! normalized, cut into statements at `!`/`?`/newline, and every statement is classified and
//! rewritten into calls on the runtime (`assign`, `current_scope`, `WHEN_BLOCK_MANAGER`).

use std::path::Path;
use tracing::debug;

pub mod compiler;
pub mod config;
pub mod crawler;
pub mod error;
pub mod evaluator;
pub mod lexer;
pub mod output;
pub mod parser;
pub mod scope;
pub mod segmenter;
pub mod token;

pub use compiler::{CompileOptions, CompiledUnit, Compiler};
pub use error::CompilerError;

/// Compile every unit of a source file. The first failing unit stops the run, so nothing is
/// written for a file with errors.
pub fn transpile(
    source: &str,
    path: &Path,
    options: &CompileOptions,
) -> Result<Vec<CompiledUnit>, CompilerError> {
    segmenter::split_units(source)
        .iter()
        .map(|unit| {
            debug!(name = ?unit.name, first_line = unit.first_line, "compiling unit");
            Compiler::compile_unit(path, options, unit)
        })
        .collect()
}
