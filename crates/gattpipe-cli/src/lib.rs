//! gattpipe CLI library
//!
//! Argument parsing, layered configuration and terminal output for the
//! `gattpipe` binary.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod output;

pub use cli::{Cli, Commands};
pub use commands::CommandDispatcher;
pub use config::{AppConfig, CliConfig};
pub use error::{CliError, Result};
pub use output::ConsoleRenderer;
