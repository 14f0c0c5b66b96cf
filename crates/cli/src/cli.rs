//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Cue Sequencer - play timed cues against a moving position
#[derive(Parser, Debug)]
#[command(
    name = "cue-sequencer",
    author,
    version,
    about = "Timed cue sequencer driven by a motion",
    long_about = "Runs a cue sequencing scenario.\n\n\
                  Loads cues and a motion from a scenario file, replays its timeline \n\
                  and prints the ordered ENTER / EXIT / CHANGE events."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "CUE_SEQUENCER_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "compact",
        global = true,
        env = "CUE_SEQUENCER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a scenario and print its events
    Run(RunArgs),

    /// Validate a scenario file without running it
    Validate(ValidateArgs),

    /// Display scenario information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to scenario file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "scenario.toml",
        env = "CUE_SEQUENCER_SCENARIO"
    )]
    pub config: PathBuf,

    /// Override the scenario duration in seconds
    #[arg(long)]
    pub duration: Option<f64>,

    /// Run against the wall clock instead of simulated time
    #[arg(long)]
    pub realtime: bool,

    /// Print every event as a JSON line
    #[arg(long)]
    pub json: bool,

    /// Do not print individual events, only the summary
    #[arg(long)]
    pub summary_only: bool,

    /// Validate the scenario and exit without running it
    #[arg(long)]
    pub dry_run: bool,

    /// Channel buffer size for the realtime driver
    #[arg(long, default_value = "100", env = "CUE_SEQUENCER_BUFFER_SIZE")]
    pub buffer_size: usize,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "CUE_SEQUENCER_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to scenario file to validate
    #[arg(short, long, default_value = "scenario.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to scenario file
    #[arg(short, long, default_value = "scenario.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// List every cue
    #[arg(long)]
    pub cues: bool,

    /// List timeline steps
    #[arg(long)]
    pub timeline: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    Pretty,
    /// Compact single-line format
    #[default]
    Compact,
}
