//! CLI argument definitions using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Session tracking CLI
///
/// Lists, inspects and revokes user sessions and runs garbage collection.
#[derive(Parser, Debug)]
#[command(name = "usersess")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file (default: ~/.usersess/config.toml)
    #[arg(long, global = true, env = "USERSESS_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the session table and its indexes
    Init,

    /// List the sessions of a user, most recently used first
    List {
        /// User whose sessions to list
        #[arg(short, long)]
        user: String,

        /// Include expired sessions
        #[arg(short, long)]
        all: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one session record
    Show {
        /// Session identifier
        identifier: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Destroy a session: payload and record
    Revoke {
        /// Session identifier
        identifier: String,
    },

    /// Run one garbage collection sweep
    Gc {
        /// Lifetime handed to the payload engine, in seconds
        #[arg(long)]
        max_lifetime: Option<u64>,
    },

    /// Sweep periodically until interrupted
    GcDaemon {
        /// Seconds between sweeps (default: gc.interval_secs)
        #[arg(long)]
        interval: Option<u64>,

        /// Lifetime handed to the payload engine, in seconds
        #[arg(long)]
        max_lifetime: Option<u64>,
    },

    /// Active session count and configuration summary
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
