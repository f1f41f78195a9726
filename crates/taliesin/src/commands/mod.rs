//! Command implementations for the Taliesin CLI.

pub mod converse;
pub mod repl;
