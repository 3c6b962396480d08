//! CLI command definitions and subcommands

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// scopelink - twin-telescope observation coordinator
#[derive(Parser)]
#[command(
    name = "scopelink",
    about = "Coordinates two observation nodes over a shared Redis bus",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Run the capture watcher node (publishes Survey Records)
    Watch,

    /// Run the control loop node (drives the observing hardware)
    Control,

    /// Publish an exposure-parameter override, as the dashboard would
    Override {
        /// Exposure duration in seconds
        #[arg(short, long)]
        exposure: Option<i64>,

        /// Filter name or wheel position
        #[arg(short, long)]
        filter: Option<String>,

        /// Target CCD temperature in degrees Celsius
        #[arg(short, long)]
        temperature: Option<f64>,
    },

    /// Read and decode a bus key
    Peek {
        /// Bus key (result, cam_info, website_value)
        key: String,

        /// Output format
        #[arg(short = 'F', long, default_value = "text")]
        format: OutputFormat,
    },

    /// Configuration helpers
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Write a commented default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Output format for peek
#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}
