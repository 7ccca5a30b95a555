//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Dwell-time tracker.
///
/// Measures how long a page is actively viewed, pausing on idle and on tab
/// switches, and fires callbacks as the active time crosses thresholds.
#[derive(Debug, Parser)]
#[command(name = "dwell", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Replay a timeline script against a simulated clock.
    Simulate {
        /// Script file, one `<at_ms> <action>` per line (`-` for stdin).
        script: PathBuf,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Track a live session fed by signal names on stdin.
    Watch,

    /// Print the effective configuration.
    Config,
}
