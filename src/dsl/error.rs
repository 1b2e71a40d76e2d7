//! Error types for the pattern language compiler.
//!
//! Almost nothing in the language is an error: unknown words, stack underflow
//! and stray brackets all degrade into inert values. What remains is runaway
//! growth, which aborts the whole compile pass so the engine can keep the
//! last good program.

use std::fmt;

use super::token::SourceRange;

/// An error that aborted a compile pass.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileError {
    pub message: String,
    pub range: Option<SourceRange>,
    pub kind: ErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Macro expansion nested deeper than the compiler allows.
    MacroDepth,
    /// A value nested deeper than the compiler allows.
    NestingDepth,
    /// Macro expansion ran more tokens than one compile may.
    ExpansionLimit,
    /// One compile built more pattern nodes than it may.
    PatternSize,
}

impl CompileError {
    pub fn macro_depth(name: &str, range: SourceRange, limit: usize) -> Self {
        Self {
            message: format!("macro '{name}' expanded more than {limit} levels deep"),
            range: Some(range),
            kind: ErrorKind::MacroDepth,
        }
    }

    pub fn nesting_depth(range: SourceRange, limit: usize) -> Self {
        Self {
            message: format!("value nested more than {limit} levels deep"),
            range: Some(range),
            kind: ErrorKind::NestingDepth,
        }
    }

    pub fn expansion_limit(range: SourceRange, limit: usize) -> Self {
        Self {
            message: format!("macros expanded more than {limit} tokens"),
            range: Some(range),
            kind: ErrorKind::ExpansionLimit,
        }
    }

    pub fn pattern_size(range: SourceRange, limit: usize) -> Self {
        Self {
            message: format!("program built more than {limit} pattern nodes"),
            range: Some(range),
            kind: ErrorKind::PatternSize,
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.range {
            Some(r) => write!(f, "[{}..{}] {:?}: {}", r.start, r.end, self.kind, self.message),
            None => write!(f, "{:?}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for CompileError {}
