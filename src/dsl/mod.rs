//! Pattern language front end: lexer, stack-machine compiler, eval formatter.

pub mod compile;
pub mod error;
pub mod format;
pub mod lexer;
pub mod number;
pub mod token;
pub mod words;

pub use compile::{Command, Mode, Program};
pub use error::CompileError;
pub use token::{SourceRange, Token};

use compile::compile_source;

/// The pattern language compiler.
pub struct Compiler;

impl Compiler {
    /// Compile source for playback, starting from the committed tempo `bpm`.
    pub fn compile(source: &str, bpm: f64) -> Result<Program, CompileError> {
        compile_source(source, bpm, Mode::Commit)
    }

    /// Compile source without committing it and format the result.
    pub fn evaluate(source: &str, bpm: f64) -> Result<String, CompileError> {
        let program = compile_source(source, bpm, Mode::Eval)?;
        Ok(format::format_program(&program))
    }
}
