//! Messages exchanged between the engine and its host.

use crate::dsl::SourceRange;

use super::sample::SampleBuffer;

/// Host → engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Source text to compile and commit.
    Source(String),
    /// Source text to compile and format without committing.
    Eval(String),
    /// Register or replace a decoded sample.
    Sample { name: String, buffer: SampleBuffer },
}

/// Engine → host.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Reply to [`Inbound::Eval`].
    Result(String),
    /// Sample names a committed program uses that are not registered yet.
    Request(Vec<String>),
    /// Source ranges sounding at the start of a render block.
    Highlight(Vec<SourceRange>),
}
