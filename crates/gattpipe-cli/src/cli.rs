//! Command-line interface definitions and parsing

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List nearby devices and show which ones match the peripheral filter
    Scan {
        /// How long to scan, in seconds
        #[arg(short, long, default_value_t = 10)]
        seconds: u64,
    },
    /// Connect to the peripheral and stay connected until Ctrl-C or link loss
    Connect,
    /// Connect, send one JSON payload and disconnect
    Send {
        /// Read the payload from a file
        #[arg(short, long, conflicts_with = "json")]
        file: Option<PathBuf>,
        /// Inline payload
        #[arg(short, long)]
        json: Option<String>,
        /// Refuse payloads that are not valid JSON
        #[arg(long)]
        strict: bool,
    },
    /// Print the effective configuration as TOML
    Config,
}
