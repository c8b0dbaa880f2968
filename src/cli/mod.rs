//! CLI interface for poly-flash
//!
//! Provides subcommands for:
//! - `run`: Watch the current market and log flash crashes
//! - `config`: Show the effective configuration

mod run;

pub use run::RunArgs;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "poly-flash")]
#[command(about = "Flash-crash engine for Polymarket 15-minute up/down markets")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Watch the current market and log flash crashes
    Run(RunArgs),
    /// Show the effective configuration
    Config,
}
