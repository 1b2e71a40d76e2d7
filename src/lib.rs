//! fzrth: a stack-based live coding pattern language and its real-time scheduler.

pub mod audio;
pub mod config;
pub mod dsl;
pub mod engine;
pub mod pattern;
