//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for Sluice using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// Sluice - Event-log ingestion pipeline
#[derive(Parser, Debug)]
#[command(name = "sluice")]
#[command(version, about, long_about = None)]
#[command(author = "Sluice Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "sluice.toml", env = "SLUICE_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "SLUICE_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Consume file-arrival notifications until a shutdown signal
    Run(commands::run::RunArgs),

    /// Process a single file without the inbound queue
    Ingest(commands::ingest::IngestArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}
