//! CLI module for formtables
//!
//! Provides command-line interface for:
//! - init: Create an empty catalog
//! - compile: Compile a form file into tables
//! - inspect: Print a stored form definition

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{compile, init, inspect, run, run_command};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_error, write_response};
