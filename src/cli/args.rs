//! CLI argument definitions using clap
//!
//! Commands:
//! - formtables init --config <path>
//! - formtables compile --config <path> --form <path>
//! - formtables inspect --config <path> --namespace <ns>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// formtables - compile hierarchical form definitions into relational tables
#[derive(Parser, Debug)]
#[command(name = "formtables")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Log lines below this severity are suppressed (trace, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create an empty catalog in the configured data directory
    Init {
        /// Path to configuration file
        #[arg(long, default_value = "./formtables.json")]
        config: PathBuf,
    },

    /// Compile a form file and create its tables
    Compile {
        /// Path to configuration file
        #[arg(long, default_value = "./formtables.json")]
        config: PathBuf,

        /// Path to the form definition (JSON)
        #[arg(long)]
        form: PathBuf,
    },

    /// Print the stored definition of a form
    Inspect {
        /// Path to configuration file
        #[arg(long, default_value = "./formtables.json")]
        config: PathBuf,

        /// Namespace of the form
        #[arg(long)]
        namespace: String,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
