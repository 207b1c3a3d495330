// Command-line interface

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Posecoach - guided yoga pose practice against remote pose classifiers
#[derive(Parser, Debug)]
#[command(name = "posecoach")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path (defaults to ~/.posecoach/config/settings.json)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay frames through the classification loop
    Run {
        /// Directory of still frames (png/jpg), replayed in name order
        #[arg(short, long)]
        frames: PathBuf,

        /// Write the last skeleton overlay to this PNG when the session ends
        #[arg(short, long)]
        overlay_out: Option<PathBuf>,

        /// Stop after this many cycles
        #[arg(short, long)]
        max_cycles: Option<u64>,

        /// Seed for prompt selection
        #[arg(long)]
        seed: Option<u64>,
    },

    /// View or reset configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,

    /// Overwrite the configuration file with defaults
    Reset,

    /// Check the configuration file and report problems
    Validate,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
