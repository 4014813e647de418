//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// calhook - Google Calendar change notifications into an event log
#[derive(Debug, Parser)]
#[command(name = "calhook")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "CALHOOK_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v', global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the webhook server in the foreground (default)
    Serve {
        /// Port to listen on
        #[arg(long, short)]
        port: Option<u16>,

        /// Publicly reachable base URL, e.g. a tunnel
        #[arg(long)]
        public_url: Option<String>,

        /// Append batches to this JSON-lines file
        #[arg(long)]
        events_file: Option<PathBuf>,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration
    Dump,
    /// Check that the configuration resolves and is valid
    Validate,
    /// Show the configuration file path
    Path,
}
