//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand};

/// Serve command arguments.
#[derive(Debug, Args)]
pub struct ServeCommand {
    /// Address to bind (overrides config and HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind (overrides config and PORT)
    #[arg(short, long)]
    pub port: Option<u16>,
}

/// Fetch command arguments.
#[derive(Debug, Args)]
pub struct FetchCommand {
    /// Where to write the raw payload
    #[arg(short, long, value_name = "FILE", default_value = "closures.json")]
    pub output: PathBuf,

    /// Print a summary of the closures instead of only saving them
    #[arg(short, long)]
    pub summary: bool,
}

/// Render command arguments.
#[derive(Debug, Args)]
pub struct RenderCommand {
    /// Render from a saved payload instead of calling the API
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Where to write the map page
    #[arg(short, long, value_name = "FILE", default_value = "map.html")]
    pub output: PathBuf,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}
