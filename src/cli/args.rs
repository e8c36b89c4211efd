//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! Available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// famforge - batch processor for parametric CAD family documents
#[derive(Parser, Debug)]
#[command(name = "famforge")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a configured batch against a session directory
    Run {
        /// Run configuration file (TOML)
        #[arg(short, long)]
        config: PathBuf,

        /// Session directory holding the family documents
        #[arg(short, long)]
        dir: PathBuf,

        /// Fail the whole run on the first document whose pipeline fails
        #[arg(long)]
        strict: bool,
    },

    /// Validate a configuration and show the compiled execution plan
    Inspect {
        /// Run configuration file (TOML)
        #[arg(short, long)]
        config: PathBuf,
    },
}
