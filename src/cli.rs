//! Command-line interface for framestep
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Frame-synchronous decode scheduler
#[derive(Parser, Debug)]
#[command(name = "framestep", version, about = "Frame-synchronous decode scheduler")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Verbose logging (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Decode a WAV file and print one report per pass
    Decode {
        /// WAV file to decode
        #[arg(value_name = "WAV")]
        input: PathBuf,

        /// Detect utterance boundaries and carry input over between segments
        #[arg(long)]
        segment: bool,

        /// Reject input shorter than this many milliseconds (0 disables)
        #[arg(long, value_name = "MS")]
        reject_short_ms: Option<u32>,

        /// Feed frames one at a time through the streaming feeder
        #[arg(long)]
        streaming: bool,

        /// Print the decode summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// View configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

/// Configuration actions
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML (default)
    Show,
    /// Print the default configuration file path
    Path,
}
