//! CLI command definitions using clap.
//!
//! - watch: follow a run until it finishes
//! - start: start a run from a payload file, then watch it
//! - history: list saved runs
//! - show: print a saved run

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Runwatch - follow backend automation runs as they progress
#[derive(Parser, Debug)]
#[command(name = "runwatch")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Follow a run until it finishes
    Watch {
        /// Run key returned when the run was started
        run_key: String,

        /// Poll full snapshots instead of long-polling for events
        #[arg(long)]
        snapshot: bool,
    },

    /// Start a run from a JSON payload file
    Start {
        /// Path to the JSON payload, posted verbatim
        payload: PathBuf,

        /// Print the run key and exit without watching
        #[arg(long)]
        no_watch: bool,

        /// Poll full snapshots instead of long-polling for events
        #[arg(long)]
        snapshot: bool,
    },

    /// List saved runs, newest first
    History {
        /// Maximum number of runs to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Show the steps and identifiers of a saved run
    Show {
        /// Run key to show
        run_key: String,
    },
}
