pub mod commands;
pub mod context;
pub mod output;

use clap::{Parser, Subcommand};

use crate::config::app_config::SourceKind;

/// Read the admin audit log the way a human would: who did what to whom.
#[derive(Parser, Debug)]
#[command(name = "rosterlog", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Read from this source instead of the configured one
    #[arg(long, global = true, value_enum)]
    pub source: Option<SourceKind>,

    /// Verbose output (debug logging on stderr)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet mode: only show errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to an alternative project directory (default: .rosterlog)
    #[arg(long, global = true)]
    pub config: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize rosterlog in the current directory
    Init,

    /// Show reconstructed audit history
    Log {
        /// Only entries with this action code (e.g. member.ban)
        #[arg(long)]
        action: Option<String>,
        /// Filter by actor name or email (substring, case-insensitive)
        #[arg(long)]
        actor: Option<String>,
        /// Filter by target name or email (substring, case-insensitive)
        #[arg(long)]
        target: Option<String>,
        /// Filter by status
        #[arg(long, value_parser = ["ok", "partial", "error"])]
        status: Option<String>,
        /// Entries since this date (ISO 8601, YYYY-MM-DD)
        #[arg(long)]
        since: Option<String>,
        /// Show the newest N entries
        #[arg(long)]
        last: Option<usize>,
        /// Print entries as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one audit entry in detail
    Show {
        /// Audit entry id
        id: String,
    },

    /// Show project configuration and source health
    Status,
}
