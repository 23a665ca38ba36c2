//! CLI module
//!
//! Command-line interface for the importer.
//!
//! # Commands
//!
//! - `validate` - Check an input file and write a JSON report
//! - `format` - Convert an input file to canonical CSV, or write a template
//! - `import` - Submit rows to the API with checkpointing
//! - `status` - Show the saved checkpoint
//! - `clear-checkpoint` - Delete the saved checkpoint

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat};
pub use runner::{Runner, StdinPrompt, EXIT_FAILURE, EXIT_INTERRUPTED, EXIT_SUCCESS};
