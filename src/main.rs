//! formtables CLI entry point
//!
//! Parses arguments, dispatches to the CLI module and reports failures as
//! a JSON error response with a non-zero exit code. All logic lives in the
//! library.

use formtables::cli;

fn main() {
    if let Err(e) = cli::run() {
        if cli::write_error(e.code_str(), e.message()).is_err() {
            eprintln!("{}", e);
        }
        std::process::exit(1);
    }
}
