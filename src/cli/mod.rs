//! CLI layer for rfp-chat.
//!
//! Provides the command-line interface using clap, with commands for
//! asking questions, probing the search index and scaffolding prompts.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::OutputFormat;
pub use parser::{Cli, Commands};
