//! Command-line interface for tictactoe-arena.

use clap::{Parser, Subcommand};

/// Tictactoe Arena - authoritative match server for real-time tic-tac-toe
#[derive(Parser, Debug)]
#[command(name = "tictactoe-arena")]
#[command(about = "Authoritative match server for real-time tic-tac-toe", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the match server
    Serve {
        /// Host to bind to (overrides the config file)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,

        /// Path to a TOML configuration file
        #[arg(short, long)]
        config: Option<std::path::PathBuf>,
    },
}
