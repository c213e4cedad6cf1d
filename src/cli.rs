//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Inspect download offload rules.
///
/// Validates rule files and previews the headers a download would carry once
/// it went through the configured middlewares.
#[derive(Parser, Debug)]
#[command(name = "downloadview")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate a rules file (TOML, or JSON by extension)
    Check {
        /// Path to the rules file
        rules: PathBuf,
    },
    /// Show the response a local file would get under a rules file
    Preview {
        /// Path to the rules file
        rules: PathBuf,

        /// File to serve
        file: PathBuf,

        /// Client-side file name
        #[arg(long)]
        basename: Option<String>,

        /// Serve inline instead of as an attachment
        #[arg(long)]
        inline: bool,
    },
}
